//! Re-derives stop, speed-change and heading annotations of exported engine
//! records for a different set of thresholds.

use crate::engine::records::{parse_records, to_json_lines, EngineRecord, Reading};
use crate::error::{SynResult, SynoptError};
use crate::params::{Parameter, ParameterVector};
use crate::util::atomic_write;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelabelThresholds {
    #[arg(long, default_value_t = 4.0)]
    pub angle_threshold: f64,
    #[arg(long, default_value_t = 0.25)]
    pub speed_ratio: f64,
    #[arg(long, default_value_t = 0.5)]
    pub no_speed_threshold: f64,
    #[arg(long, default_value_t = 50.0)]
    pub distance_threshold: f64,
}

impl Default for RelabelThresholds {
    fn default() -> Self {
        Self::from(&ParameterVector::defaults())
    }
}

impl From<&ParameterVector> for RelabelThresholds {
    fn from(p: &ParameterVector) -> Self {
        Self {
            angle_threshold: p.get(Parameter::AngleThreshold),
            speed_ratio: p.get(Parameter::SpeedRatio),
            no_speed_threshold: p.get(Parameter::NoSpeedThreshold),
            distance_threshold: p.get(Parameter::DistanceThreshold),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackState {
    stopped: bool,
    speed_change: bool,
    last: usize,
}

type PositionKey = (String, i64, u64, u64);

fn position_key(r: &EngineRecord) -> PositionKey {
    (
        r.id.clone(),
        r.timestamp,
        (r.longitude + 0.0).to_bits(),
        (r.latitude + 0.0).to_bits(),
    )
}

/// Merges records reported for the same position, OR-ing their flags.
///
/// Scalar fields must agree, except `heading_diff` where a `-1` marker
/// yields to the other value.
pub fn merge_duplicates(records: Vec<EngineRecord>) -> SynResult<Vec<EngineRecord>> {
    let mut out: Vec<EngineRecord> = Vec::with_capacity(records.len());
    let mut seen: HashMap<PositionKey, usize> = HashMap::new();

    for rec in records {
        let key = position_key(&rec);
        match seen.get(&key) {
            None => {
                seen.insert(key, out.len());
                out.push(rec);
            }
            Some(&idx) => {
                let existing = &mut out[idx];
                existing.heading_diff = match (existing.heading_diff, rec.heading_diff) {
                    (Some(Reading::Finite(a)), Some(Reading::Finite(b))) if a.min(b) == -1.0 => {
                        Some(Reading::Finite(a.max(b)))
                    }
                    (a, b) if !readings_agree(a, b) => {
                        return Err(SynoptError::DataIntegrity(format!(
                            "conflicting heading_diff for vessel {} at {}",
                            rec.id, rec.timestamp
                        )))
                    }
                    (a, _) => a,
                };
                if !readings_agree(existing.speed, rec.speed)
                    || !readings_agree(existing.percental_speed_change, rec.percental_speed_change)
                    || !readings_agree(existing.distance, rec.distance)
                {
                    return Err(SynoptError::DataIntegrity(format!(
                        "conflicting readings for vessel {} at {}",
                        rec.id, rec.timestamp
                    )));
                }
                existing.annotation.union(&rec.annotation);
            }
        }
    }

    Ok(out)
}

fn readings_agree(a: Option<Reading>, b: Option<Reading>) -> bool {
    a == b
}

/// Recomputes event flags in time order, per vessel.
///
/// A `gap_end` clears the speed and stop flags and restarts the vessel's
/// state. A stop also clears the heading flag of the vessel's previous record.
pub fn relabel(records: &mut [EngineRecord], th: &RelabelThresholds) {
    records.sort_by_key(|r| r.timestamp);
    let mut state: HashMap<String, TrackState> = HashMap::new();

    for i in 0..records.len() {
        let id = records[i].id.clone();

        if records[i].annotation.gap_end {
            let a = &mut records[i].annotation;
            a.change_in_speed_start = false;
            a.change_in_speed_end = false;
            a.stop_start = false;
            a.stop_end = false;
            state.insert(
                id,
                TrackState {
                    stopped: false,
                    speed_change: false,
                    last: i,
                },
            );
            continue;
        }

        let rec = &records[i];
        let change_in_heading = rec.heading_change_exceeds(th.angle_threshold);

        let prev = state.get(&id).copied();
        let stopped = match prev {
            Some(s) if s.stopped && rec.distance_at_least(th.distance_threshold) => false,
            _ => rec.is_stopped(th.no_speed_threshold),
        };
        let speed_change = !stopped && rec.has_speed_change(th.speed_ratio);

        records[i].annotation.change_in_heading = change_in_heading;
        if let (true, Some(s)) = (stopped, prev) {
            records[s.last].annotation.change_in_heading = false;
        }

        let a = &mut records[i].annotation;
        match prev {
            None => {
                a.change_in_speed_start = speed_change;
                a.change_in_speed_end = false;
                a.stop_start = stopped;
                a.stop_end = false;
            }
            Some(s) => {
                let (start, end) = transition(s.speed_change, speed_change);
                a.change_in_speed_start = start;
                a.change_in_speed_end = end;

                let (start, end) = transition(s.stopped, stopped);
                a.stop_start = start;
                a.stop_end = end;
            }
        }

        state.insert(
            id,
            TrackState {
                stopped,
                speed_change,
                last: i,
            },
        );
    }
}

fn transition(before: bool, now: bool) -> (bool, bool) {
    if before == now {
        (false, false)
    } else {
        (now, !now)
    }
}

/// Relabels a JSON-lines record file in place.
pub fn relabel_file(path: &Path, th: &RelabelThresholds) -> SynResult<usize> {
    let content = fs::read_to_string(path)?;
    let records = parse_records(&content, path)?;
    let mut merged = merge_duplicates(records)?;
    relabel(&mut merged, th);
    atomic_write(path, to_json_lines(&merged)?)?;
    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, t: i64, speed: &str, extra: &str) -> EngineRecord {
        let line = format!(
            r#"{{"id":"{}","timestamp":{},"longitude":{},"latitude":0.0,"speed":{}{}}}"#,
            id, t, t as f64 * 0.01, speed, extra
        );
        parse_records(&line, Path::new("mem")).unwrap().remove(0)
    }

    #[test]
    fn stop_transitions_are_flagged_once() {
        let th = RelabelThresholds::default();
        let mut recs = vec![
            rec("a", 1, "3.0", ""),
            rec("a", 2, "0.1", ""),
            rec("a", 3, "0.1", ""),
            rec("a", 4, "3.0", r#","distance":10.0"#),
        ];
        relabel(&mut recs, &th);

        let starts: Vec<bool> = recs.iter().map(|r| r.annotation.stop_start).collect();
        let ends: Vec<bool> = recs.iter().map(|r| r.annotation.stop_end).collect();
        assert_eq!(starts, vec![false, true, false, false]);
        assert_eq!(ends, vec![false, false, false, true]);
    }

    #[test]
    fn undefined_speed_counts_as_stopped() {
        let mut recs = vec![rec("a", 1, r#""NaN""#, "")];
        relabel(&mut recs, &RelabelThresholds::default());
        assert!(recs[0].annotation.stop_start);
    }

    #[test]
    fn stop_clears_previous_heading_change() {
        let mut recs = vec![
            rec("a", 1, "3.0", r#","heading_diff":30.0"#),
            rec("a", 2, "0.0", ""),
        ];
        relabel(&mut recs, &RelabelThresholds::default());
        assert!(!recs[0].annotation.change_in_heading);
    }

    #[test]
    fn duplicates_merge_flags() {
        let a = rec("a", 1, "3.0", r#","annotation":{"gap_start":true},"heading_diff":-1.0"#);
        let b = rec("a", 1, "3.0", r#","annotation":{"stop_end":true},"heading_diff":12.0"#);
        let merged = merge_duplicates(vec![a, b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert!(merged[0].annotation.gap_start);
        assert!(merged[0].annotation.stop_end);
        assert_eq!(merged[0].heading_diff, Some(Reading::Finite(12.0)));
    }
}
