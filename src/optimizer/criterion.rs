use crate::error::SynoptError;
use crate::evaluation::EvaluationResult;
use std::fmt;
use std::str::FromStr;

/// Scalarization of `(rmse, ratio)` into a single fitness to minimize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    /// `rmse`
    Rmse,
    /// `rmse^p * ratio`
    Mult { p: f64 },
    /// `(rmse + q)^p * ratio`
    New { p: f64, q: f64 },
    /// `max(rmse, q)^p * ratio`
    Max { p: f64, q: f64 },
    /// `ratio + max(0, rmse - r)`
    Thresh { r: f64 },
}

impl Criterion {
    pub fn scalarize(&self, rmse: f64, ratio: f64) -> f64 {
        match *self {
            Criterion::Rmse => rmse,
            Criterion::Mult { p } => rmse.powf(p) * ratio,
            Criterion::New { p, q } => (rmse + q).powf(p) * ratio,
            Criterion::Max { p, q } => rmse.max(q).powf(p) * ratio,
            Criterion::Thresh { r } => ratio + (rmse - r).max(0.0),
        }
    }

    #[inline]
    pub fn score(&self, result: &EvaluationResult) -> f64 {
        self.scalarize(result.rmse, result.ratio)
    }
}

impl FromStr for Criterion {
    type Err = SynoptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(',').map(|t| t.trim()).collect();
        let bad = || SynoptError::Config(format!("unknown optimization criterion '{}'", s));

        let num = |t: &str| -> Result<f64, SynoptError> {
            t.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(bad)
        };

        match tokens.as_slice() {
            ["rmse"] => Ok(Criterion::Rmse),
            ["mult", p] => Ok(Criterion::Mult { p: num(p)? }),
            ["new", p, q] => Ok(Criterion::New {
                p: num(p)?,
                q: num(q)?,
            }),
            ["max", p, q] => Ok(Criterion::Max {
                p: num(p)?,
                q: num(q)?,
            }),
            ["thresh", r] => Ok(Criterion::Thresh { r: num(r)? }),
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Rmse => write!(f, "rmse"),
            Criterion::Mult { p } => write!(f, "mult,{}", p),
            Criterion::New { p, q } => write!(f, "new,{},{}", p, q),
            Criterion::Max { p, q } => write!(f, "max,{},{}", p, q),
            Criterion::Thresh { r } => write!(f, "thresh,{}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("thresh,15", 20.0, 0.1, 5.1)]
    #[case("new,2,1", 10.0, 0.2, 24.2)]
    #[case("rmse", 7.5, 0.3, 7.5)]
    #[case("mult,2", 3.0, 0.5, 4.5)]
    #[case("max,1,10", 4.0, 0.5, 5.0)]
    #[case("thresh,30", 20.0, 0.1, 0.1)]
    fn formulas(#[case] opt: &str, #[case] rmse: f64, #[case] ratio: f64, #[case] expected: f64) {
        let c: Criterion = opt.parse().unwrap();
        assert!((c.scalarize(rmse, ratio) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case("ratio")]
    #[case("newer,1,2")]
    #[case("new,2")]
    #[case("mult,x")]
    #[case("")]
    fn unknown_tokens_are_config_errors(#[case] opt: &str) {
        assert!(matches!(opt.parse::<Criterion>(), Err(SynoptError::Config(_))));
    }

    #[test]
    fn display_round_trips() {
        let c = Criterion::New { p: 0.75, q: 42.0 };
        assert_eq!(c.to_string().parse::<Criterion>().unwrap(), c);
    }
}
