//! Reconstruction error and compression ratio of a reduced trajectory set.

use crate::error::{SynResult, SynoptError};
use crate::geodesy::{haversine, interpolate, project};
use crate::trajectory::{NoiseAnnotation, PointKey, TrajectoryPoint, TrajectorySet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

/// How the expected position of a raw point is derived from the two reduced
/// points that bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EstimationMode {
    /// Linear interpolation in time.
    #[default]
    Interpolate,
    /// Perpendicular projection onto the line through the bounding points.
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Root mean squared deviation in meters.
    pub rmse: f64,
    /// Unique reduced timestamps per scored raw point.
    pub ratio: f64,
}

impl EvaluationResult {
    pub fn new(rmse: f64, ratio: f64) -> Self {
        Self { rmse, ratio }
    }
}

/// Partial sums for a single entity.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EntityScore {
    pub squared_error: f64,
    pub scored_points: usize,
    pub unique_timestamps: usize,
}

impl EntityScore {
    fn absorb(&mut self, other: EntityScore) {
        self.squared_error += other.squared_error;
        self.scored_points += other.scored_points;
        self.unique_timestamps += other.unique_timestamps;
    }
}

/// Scores one entity.
///
/// `reduced` must already be ordered by time; an out-of-order pair is a
/// data integrity error. Noise credits in `credits` are consumed as matching
/// raw points are skipped. Raw points before the first reduced point or after
/// the last one are never scored.
pub fn score_entity(
    id: &str,
    raw: &[TrajectoryPoint],
    reduced: &[TrajectoryPoint],
    credits: &mut HashMap<PointKey, u32>,
    mode: EstimationMode,
) -> SynResult<EntityScore> {
    let mut score = EntityScore {
        unique_timestamps: count_unique_timestamps(reduced),
        ..Default::default()
    };

    let mut cursor = 0;
    for pair in reduced.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.t > b.t {
            return Err(SynoptError::DataIntegrity(format!(
                "approximate data not in order for entity '{}' ({} > {})",
                id, a.t, b.t
            )));
        }

        while cursor < raw.len() {
            let p = raw[cursor];

            if p.t < a.t {
                cursor += 1;
                continue;
            }

            if consume_credit(credits, &p) {
                cursor += 1;
                continue;
            }

            if p.t > b.t {
                break;
            }

            let (est_lon, est_lat) = match mode {
                EstimationMode::Interpolate => {
                    interpolate((a.lon, a.lat, a.t), (b.lon, b.lat, b.t), p.t)
                }
                EstimationMode::Project => project((a.lon, a.lat), (b.lon, b.lat), (p.lon, p.lat)),
            };

            let d = haversine(p.lon, p.lat, est_lon, est_lat);
            score.squared_error += d * d;
            score.scored_points += 1;
            cursor += 1;
        }
    }

    Ok(score)
}

/// Scores every entity present in both sets and aggregates the result.
///
/// The caller's noise annotation is left untouched; each entity works on its
/// own copy of its credits. Entities are scored in parallel but summed in id
/// order, so identical inputs give bit-identical results.
pub fn estimate(
    raw: &TrajectorySet,
    reduced: &TrajectorySet,
    noise: &NoiseAnnotation,
    mode: EstimationMode,
) -> SynResult<EvaluationResult> {
    let entities: Vec<(&str, &[TrajectoryPoint])> = raw
        .iter()
        .filter(|(id, _)| reduced.contains(id))
        .collect();

    let partials: Vec<SynResult<EntityScore>> = entities
        .par_iter()
        .map(|&(id, raw_track)| {
            let mut approx = reduced.get(id).unwrap_or_default().to_vec();
            approx.sort_by_key(|p| p.t);

            let mut credits = noise.credits(id).cloned().unwrap_or_default();
            score_entity(id, raw_track, &approx, &mut credits, mode)
        })
        .collect();

    let mut total = EntityScore::default();
    for partial in partials {
        total.absorb(partial?);
    }

    if total.scored_points == 0 {
        return Err(SynoptError::Computation(
            "no raw point fell inside a reduced interval; RMSE and ratio are undefined".into(),
        ));
    }

    let n = total.scored_points as f64;
    Ok(EvaluationResult {
        rmse: (total.squared_error / n).sqrt(),
        ratio: total.unique_timestamps as f64 / n,
    })
}

fn consume_credit(credits: &mut HashMap<PointKey, u32>, p: &TrajectoryPoint) -> bool {
    match credits.get_mut(&p.key()) {
        Some(c) if *c > 0 => {
            *c -= 1;
            true
        }
        _ => false,
    }
}

fn count_unique_timestamps(sorted: &[TrajectoryPoint]) -> usize {
    let mut count = 0;
    let mut last = None;
    for p in sorted {
        if last != Some(p.t) {
            count += 1;
            last = Some(p.t);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lon: f64, lat: f64, t: i64) -> TrajectoryPoint {
        TrajectoryPoint::new(lon, lat, t)
    }

    #[test]
    fn unsorted_reduced_is_rejected() {
        let raw = [pt(0.0, 0.0, 0)];
        let reduced = [pt(0.0, 0.0, 10), pt(0.0, 0.0, 5)];
        let err = score_entity("v", &raw, &reduced, &mut HashMap::new(), Default::default())
            .unwrap_err();
        assert!(matches!(err, SynoptError::DataIntegrity(_)));
    }

    #[test]
    fn noise_credit_is_bounded() {
        let p = pt(0.5, 0.5, 5);
        let raw = [pt(0.0, 0.0, 0), p, p, pt(1.0, 1.0, 10)];
        let reduced = [pt(0.0, 0.0, 0), pt(1.0, 1.0, 10)];

        let mut credits = HashMap::new();
        credits.insert(p.key(), 1);

        let s = score_entity("v", &raw, &reduced, &mut credits, EstimationMode::Interpolate)
            .unwrap();
        // one repetition absorbed by noise, the other one scored
        assert_eq!(s.scored_points, 3);
        assert_eq!(credits[&p.key()], 0);
    }

    #[test]
    fn trailing_raw_points_are_not_scored() {
        let raw = [pt(0.0, 0.0, 0), pt(1.0, 0.0, 10), pt(5.0, 5.0, 50)];
        let reduced = [pt(0.0, 0.0, 0), pt(1.0, 0.0, 10)];
        let s = score_entity("v", &raw, &reduced, &mut HashMap::new(), Default::default())
            .unwrap();
        assert_eq!(s.scored_points, 2);
        assert_eq!(s.squared_error, 0.0);
    }

    #[test]
    fn duplicate_reduced_timestamps_count_once() {
        let reduced = [pt(0.0, 0.0, 0), pt(0.0, 0.0, 0), pt(1.0, 1.0, 10)];
        assert_eq!(count_unique_timestamps(&reduced), 2);
    }
}
