use crate::error::{SynResult, SynoptError};
use crate::trajectory::TrajectoryPoint;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A numeric reading as the engine prints it.
///
/// Divisions by zero inside the engine come out as the strings `"Infinity"`
/// and `"NaN"` instead of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReading", into = "RawReading")]
pub enum Reading {
    Finite(f64),
    Infinite,
    Undefined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawReading {
    Number(f64),
    Text(String),
}

impl TryFrom<RawReading> for Reading {
    type Error = String;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        match raw {
            RawReading::Number(v) if v.is_nan() => Ok(Reading::Undefined),
            RawReading::Number(v) if v.is_infinite() => Ok(Reading::Infinite),
            RawReading::Number(v) => Ok(Reading::Finite(v)),
            RawReading::Text(s) => match s.as_str() {
                "Infinity" | "-Infinity" => Ok(Reading::Infinite),
                "NaN" => Ok(Reading::Undefined),
                other => other
                    .parse::<f64>()
                    .map(Reading::Finite)
                    .map_err(|_| format!("unknown numeric reading '{}'", other)),
            },
        }
    }
}

impl From<Reading> for RawReading {
    fn from(r: Reading) -> Self {
        match r {
            Reading::Finite(v) => RawReading::Number(v),
            Reading::Infinite => RawReading::Text("Infinity".into()),
            Reading::Undefined => RawReading::Text("NaN".into()),
        }
    }
}

/// Event flags attached to an engine record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    pub change_in_speed_start: bool,
    pub change_in_speed_end: bool,
    pub stop_start: bool,
    pub stop_end: bool,
    pub slow_motion_start: bool,
    pub slow_motion_end: bool,
    pub gap_start: bool,
    pub gap_end: bool,
    pub change_in_heading: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Annotation {
    /// Flag-wise OR with another annotation of the same position.
    pub fn union(&mut self, other: &Annotation) {
        self.change_in_speed_start |= other.change_in_speed_start;
        self.change_in_speed_end |= other.change_in_speed_end;
        self.stop_start |= other.stop_start;
        self.stop_end |= other.stop_end;
        self.slow_motion_start |= other.slow_motion_start;
        self.slow_motion_end |= other.slow_motion_end;
        self.gap_start |= other.gap_start;
        self.gap_end |= other.gap_end;
        self.change_in_heading |= other.change_in_heading;
        for (k, v) in &other.other {
            match (self.other.get_mut(k), v) {
                (Some(Value::Bool(mine)), Value::Bool(theirs)) => *mine |= *theirs,
                (None, _) => {
                    self.other.insert(k.clone(), v.clone());
                }
                _ => {}
            }
        }
    }
}

/// One line of an engine output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub timestamp: i64,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Reading>,
    #[serde(default)]
    pub annotation: Annotation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_diff: Option<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percental_speed_change: Option<Reading>,
    /// `time_elapsed`, `ingestion_timestamp`, `msg_error_flag` and anything newer.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl EngineRecord {
    pub fn point(&self) -> TrajectoryPoint {
        TrajectoryPoint::new(self.longitude, self.latitude, self.timestamp)
    }

    /// Below the no-speed threshold. An infinite speed is moving, an
    /// undefined one (0/0) is stopped.
    pub fn is_stopped(&self, no_speed_threshold: f64) -> bool {
        match self.speed {
            Some(Reading::Finite(v)) => v < no_speed_threshold,
            Some(Reading::Infinite) => false,
            Some(Reading::Undefined) => true,
            None => false,
        }
    }

    /// Relative speed change above `speed_ratio`. The engine's `-1` marker and
    /// undefined readings mean no change; an infinite one is a change.
    pub fn has_speed_change(&self, speed_ratio: f64) -> bool {
        match self.percental_speed_change {
            Some(Reading::Finite(v)) if v == -1.0 => false,
            Some(Reading::Finite(v)) => v > speed_ratio,
            Some(Reading::Infinite) => true,
            Some(Reading::Undefined) | None => false,
        }
    }

    pub fn heading_change_exceeds(&self, angle_threshold: f64) -> bool {
        match self.heading_diff {
            Some(Reading::Finite(v)) => v > angle_threshold,
            Some(Reading::Infinite) => true,
            _ => false,
        }
    }

    pub fn distance_at_least(&self, distance_threshold: f64) -> bool {
        match self.distance {
            Some(Reading::Finite(v)) => v >= distance_threshold,
            Some(Reading::Infinite) => true,
            _ => false,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(i) => i.to_string(),
        Id::Float(f) => f.to_string(),
    })
}

/// Parses a JSON-lines stream. Blank lines are skipped.
pub fn parse_records(content: &str, origin: &Path) -> SynResult<Vec<EngineRecord>> {
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let rec: EngineRecord = serde_json::from_str(line).map_err(|e| SynoptError::Parse {
            path: origin.to_path_buf(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        out.push(rec);
    }
    Ok(out)
}

/// Reads a JSON-lines stream; a missing file reads as empty.
pub fn read_records(path: &Path) -> SynResult<Vec<EngineRecord>> {
    match fs::read_to_string(path) {
        Ok(content) => parse_records(&content, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Serializes records one per line.
pub fn to_json_lines<'a, I: IntoIterator<Item = &'a EngineRecord>>(records: I) -> SynResult<String> {
    let mut out = String::new();
    for rec in records {
        out.push_str(&serde_json::to_string(rec)?);
        out.push('\n');
    }
    Ok(out)
}
