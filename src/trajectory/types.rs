use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A timestamped WGS84 position.
///
/// `t` is kept in the unit of the source files (the AIS partitions carry
/// milliseconds); the scorer only ever compares and subtracts timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub lon: f64,
    pub lat: f64,
    pub t: i64,
}

/// Exact-match identity of a point, used to look up noise credits.
pub type PointKey = (u64, u64, i64);

impl TrajectoryPoint {
    pub fn new(lon: f64, lat: f64, t: i64) -> Self {
        Self { lon, lat, t }
    }

    #[inline]
    pub fn key(&self) -> PointKey {
        // `+ 0.0` folds -0.0 into 0.0 so both spellings hash the same
        ((self.lon + 0.0).to_bits(), (self.lat + 0.0).to_bits(), self.t)
    }
}

/// Per-entity point sequences, keyed by vessel id.
///
/// Entities iterate in id order, which keeps every reduction over the set
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectorySet {
    tracks: BTreeMap<String, Vec<TrajectoryPoint>>,
}

impl TrajectorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: &str, point: TrajectoryPoint) {
        if let Some(track) = self.tracks.get_mut(id) {
            track.push(point);
        } else {
            self.tracks.insert(id.to_string(), vec![point]);
        }
    }

    pub fn get(&self, id: &str) -> Option<&[TrajectoryPoint]> {
        self.tracks.get(id).map(|v| v.as_slice())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TrajectoryPoint])> {
        self.tracks.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn entity_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn point_count(&self) -> usize {
        self.tracks.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stable sort of every track by timestamp.
    pub fn sort_by_time(&mut self) {
        for track in self.tracks.values_mut() {
            track.sort_by_key(|p| p.t);
        }
    }
}

impl FromIterator<(String, TrajectoryPoint)> for TrajectorySet {
    fn from_iter<I: IntoIterator<Item = (String, TrajectoryPoint)>>(iter: I) -> Self {
        let mut set = TrajectorySet::new();
        for (id, p) in iter {
            set.push(&id, p);
        }
        set
    }
}

/// Raw points the engine flagged as unreliable, with occurrence counts.
///
/// Scoring consumes credits, so callers hand the scorer a reference and the
/// scorer works on its own copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseAnnotation {
    counts: HashMap<String, HashMap<PointKey, u32>>,
}

impl NoiseAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: &str, point: &TrajectoryPoint) {
        let entity = match self.counts.get_mut(id) {
            Some(e) => e,
            None => self.counts.entry(id.to_string()).or_default(),
        };
        *entity.entry(point.key()).or_insert(0) += 1;
    }

    pub fn credits(&self, id: &str) -> Option<&HashMap<PointKey, u32>> {
        self.counts.get(id)
    }

    pub fn count(&self, id: &str, point: &TrajectoryPoint) -> u32 {
        self.counts
            .get(id)
            .and_then(|m| m.get(&point.key()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .flat_map(|m| m.values())
            .map(|&c| c as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
