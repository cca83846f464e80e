use crate::error::SynoptError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Tunable parameters of the compression engine, in gene order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Parameter {
    /// Turning critical points.
    AngleThreshold,
    /// Gap critical points.
    GapPeriod,
    /// Points kept in the engine buffer.
    BufferSize,
    /// Buffer span in seconds.
    HistoryPeriod,
    /// Stop critical points.
    NoSpeedThreshold,
    /// Buffer span in meters, also ends stop events.
    DistanceThreshold,
    /// Change-in-speed critical points.
    SpeedRatio,
    /// Slow-motion critical points.
    LowSpeedThreshold,
}

pub const GENE_COUNT: usize = 8;

/// Integer genes above this value live on a grid of [`SNAP_STEP`].
pub const SNAP_ABOVE: f64 = 200.0;
pub const SNAP_STEP: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneKind {
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneSpec {
    pub kind: GeneKind,
    pub low: f64,
    pub high: f64,
}

impl GeneSpec {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.low && v <= self.high
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.low).min(self.high)
    }
}

impl Parameter {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> GeneSpec {
        use GeneKind::*;
        let (kind, low, high) = match self {
            Parameter::AngleThreshold => (Real, 2.0, 25.0),
            Parameter::GapPeriod => (Integer, 200.0, 5000.0),
            Parameter::BufferSize => (Integer, 3.0, 50.0),
            Parameter::HistoryPeriod => (Integer, 300.0, 5000.0),
            Parameter::NoSpeedThreshold => (Real, 0.05, 2.0),
            Parameter::DistanceThreshold => (Real, 2.0, 100.0),
            Parameter::SpeedRatio => (Real, 0.01, 0.8),
            Parameter::LowSpeedThreshold => (Real, 0.05, 8.0),
        };
        GeneSpec { kind, low, high }
    }

    /// The engine's shipped default.
    pub fn default_value(self) -> f64 {
        match self {
            Parameter::AngleThreshold => 4.0,
            Parameter::GapPeriod => 1800.0,
            Parameter::BufferSize => 5.0,
            Parameter::HistoryPeriod => 3600.0,
            Parameter::NoSpeedThreshold => 0.5,
            Parameter::DistanceThreshold => 50.0,
            Parameter::SpeedRatio => 0.25,
            Parameter::LowSpeedThreshold => 5.0,
        }
    }

    /// Renders a value the way the engine's configuration expects it.
    pub fn format_value(self, v: f64) -> String {
        match self.spec().kind {
            GeneKind::Integer => format!("{}", v.trunc() as i64),
            GeneKind::Real => format!("{:?}", v),
        }
    }
}

/// AIS ship type codes with a data directory of their own.
pub const SHIP_TYPES: &[(&str, &str)] = &[
    ("0", "Unknown"),
    ("30", "Fishing"),
    ("35", "Military"),
    ("36", "Sailing Vessel"),
    ("37", "Pleasure Craft"),
    ("50", "Pilot Vessel"),
    ("51", "Search and Rescue"),
    ("52", "Tug"),
    ("60", "Passenger"),
    ("70", "Cargo"),
    ("80", "Tanker"),
    ("90", "Other"),
];

/// Vectors tuned on brest under `thresh,15`.
const TUNED_BREST: &[(&str, [f64; GENE_COUNT])] = &[
    ("60", [9.83, 200.0, 44.0, 3400.0, 1.41, 57.18, 0.34, 6.22]),
    ("0", [13.67, 200.0, 4.0, 2400.0, 1.18, 15.03, 0.01, 0.8]),
    ("30", [25.0, 300.0, 3.0, 2150.0, 0.71, 56.96, 0.01, 0.98]),
    ("52", [23.49, 600.0, 43.0, 4050.0, 1.26, 34.78, 0.01, 0.48]),
    ("70", [22.46, 200.0, 3.0, 2450.0, 0.63, 17.94, 0.01, 4.59]),
    ("35", [21.49, 2650.0, 3.0, 1350.0, 1.25, 28.19, 0.01, 0.4]),
];

/// Types that were never tuned borrow the vector of a type with similar
/// size and behaviour.
const SIMILAR_TYPES: &[(&str, &str)] = &[
    ("60", "60"),
    ("0", "0"),
    ("30", "30"),
    ("52", "52"),
    ("70", "70"),
    ("35", "35"),
    ("80", "70"),
    ("89", "70"),
    ("81", "70"),
    ("84", "70"),
    ("82", "70"),
    ("83", "70"),
    ("88", "70"),
    ("79", "70"),
    ("71", "70"),
    ("74", "70"),
    ("73", "70"),
    ("72", "70"),
    ("77", "70"),
    ("76", "70"),
    ("78", "70"),
    ("50", "52"),
    ("69", "60"),
    ("90", "0"),
];

pub fn ship_type_name(code: &str) -> Option<&'static str> {
    SHIP_TYPES.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

/// The tuned type whose vector `code` uses, if any.
pub fn similar_type(code: &str) -> Option<&'static str> {
    SIMILAR_TYPES.iter().find(|(c, _)| *c == code).map(|(_, t)| *t)
}

/// Tuned vector for a ship type, looked up through [`similar_type`].
pub fn tuned_for(code: &str) -> Option<ParameterVector> {
    let tuned = similar_type(code)?;
    TUNED_BREST
        .iter()
        .find(|(c, _)| *c == tuned)
        .map(|(_, v)| ParameterVector::new(*v))
}

/// Snaps to the nearest multiple of [`SNAP_STEP`], ties to even.
pub fn snap_to_grid(v: f64) -> f64 {
    SNAP_STEP * (v / SNAP_STEP).round_ties_even()
}

/// Rounds to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// A full assignment of the eight genes.
///
/// Equality and hashing are exact on the stored values, so the vector can key
/// the result cache directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector([OrderedFloat<f64>; GENE_COUNT]);

impl ParameterVector {
    pub fn new(values: [f64; GENE_COUNT]) -> Self {
        Self(values.map(OrderedFloat))
    }

    pub fn defaults() -> Self {
        let mut values = [0.0; GENE_COUNT];
        for p in Parameter::iter() {
            values[p.index()] = p.default_value();
        }
        Self::new(values)
    }

    pub fn get(&self, p: Parameter) -> f64 {
        self.0[p.index()].0
    }

    pub fn set(&mut self, p: Parameter, v: f64) {
        self.0[p.index()] = OrderedFloat(v);
    }

    pub fn values(&self) -> [f64; GENE_COUNT] {
        self.0.map(|v| v.0)
    }

    pub fn is_within_bounds(&self) -> bool {
        Parameter::iter().all(|p| p.spec().contains(self.get(p)))
    }

    /// `val_<NAME>=<value>` lines appended to the engine configuration.
    pub fn config_lines(&self) -> String {
        let mut out = String::new();
        for p in Parameter::iter() {
            let name: &'static str = p.into();
            out.push_str("val_");
            out.push_str(name);
            out.push('=');
            out.push_str(&p.format_value(self.get(p)));
            out.push('\n');
        }
        out
    }

    /// Single-point crossover: genes `[0, point)` from `self`, the rest from `other`.
    pub fn splice(&self, other: &ParameterVector, point: usize) -> ParameterVector {
        let mut out = *self;
        out.0[point..].copy_from_slice(&other.0[point..]);
        out
    }
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in Parameter::iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p.format_value(self.get(p)))?;
        }
        write!(f, ")")
    }
}

/// Parses eight comma separated values, optionally wrapped in parentheses,
/// as printed by [`ParameterVector`]'s `Display`.
impl FromStr for ParameterVector {
    type Err = SynoptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let values: Vec<f64> = inner
            .split(',')
            .map(|t| t.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| SynoptError::Config(format!("bad parameter vector '{}': {}", s, e)))?;

        let values: [f64; GENE_COUNT] = values.try_into().map_err(|v: Vec<f64>| {
            SynoptError::Config(format!(
                "parameter vector needs {} values, got {}",
                GENE_COUNT,
                v.len()
            ))
        })?;
        Ok(ParameterVector::new(values))
    }
}

/// A population member: a vector plus its memoized scalar fitness.
///
/// Any change to the genes must go through [`Individual::set_params`] so the
/// stale fitness is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    params: ParameterVector,
    pub fitness: Option<f64>,
}

impl Individual {
    pub fn new(params: ParameterVector) -> Self {
        Self {
            params,
            fitness: None,
        }
    }

    pub fn params(&self) -> &ParameterVector {
        &self.params
    }

    pub fn set_params(&mut self, params: ParameterVector) {
        if params != self.params {
            self.params = params;
            self.fitness = None;
        }
    }

    pub fn invalidate(&mut self) {
        self.fitness = None;
    }
}

impl From<ParameterVector> for Individual {
    fn from(params: ParameterVector) -> Self {
        Individual::new(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn names_round_trip_through_strum() {
        assert_eq!(Parameter::GapPeriod.to_string(), "GAP_PERIOD");
        assert_eq!(
            Parameter::from_str("LOW_SPEED_THRESHOLD").unwrap(),
            Parameter::LowSpeedThreshold
        );
    }

    #[test]
    fn defaults_are_in_bounds() {
        let d = ParameterVector::defaults();
        assert!(d.is_within_bounds());
        assert_eq!(d.to_string(), "(4.0, 1800, 5, 3600, 0.5, 50.0, 0.25, 5.0)");
    }

    #[test]
    fn display_form_parses_back() {
        let d = ParameterVector::defaults();
        assert_eq!(d.to_string().parse::<ParameterVector>().unwrap(), d);
        assert!("1,2,3".parse::<ParameterVector>().is_err());
        assert!("a,1,1,1,1,1,1,1".parse::<ParameterVector>().is_err());
    }

    #[test]
    fn snapping_ties_go_to_even() {
        assert_eq!(snap_to_grid(225.0), 200.0);
        assert_eq!(snap_to_grid(275.0), 300.0);
        assert_eq!(snap_to_grid(1812.0), 1800.0);
    }

    #[test]
    fn splice_takes_tail_from_other() {
        let a = ParameterVector::new([1.0; GENE_COUNT]);
        let b = ParameterVector::new([2.0; GENE_COUNT]);
        let c = a.splice(&b, 3);
        assert_eq!(c.values(), [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn untuned_types_borrow_a_similar_vector() {
        assert_eq!(tuned_for("80"), tuned_for("70"));
        assert_eq!(tuned_for("50"), tuned_for("52"));
        assert_eq!(tuned_for("70").unwrap().get(Parameter::AngleThreshold), 22.46);
        assert!(tuned_for("99").is_none());
        assert_eq!(ship_type_name("52"), Some("Tug"));
        assert!(TUNED_BREST.iter().all(|(_, v)| ParameterVector::new(*v).is_within_bounds()));
    }

    #[test]
    fn set_params_drops_fitness() {
        let mut ind = Individual::new(ParameterVector::defaults());
        ind.fitness = Some(1.0);
        ind.set_params(ParameterVector::defaults());
        assert_eq!(ind.fitness, Some(1.0));

        let mut p = ParameterVector::defaults();
        p.set(Parameter::BufferSize, 7.0);
        ind.set_params(p);
        assert_eq!(ind.fitness, None);
    }
}
