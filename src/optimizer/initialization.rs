use super::Criterion;
use crate::cache::ResultCache;
use crate::params::{round2, snap_to_grid, GeneKind, Parameter, ParameterVector, GENE_COUNT, SNAP_ABOVE};
use fastrand::Rng;
use strum::IntoEnumIterator;

/// Elitist seeding: once the cache holds more than `min_cache` results, a new
/// individual is copied from the `pool` best cached vectors with
/// `probability`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedingPolicy {
    pub probability: f64,
    pub pool: usize,
    pub min_cache: usize,
}

impl Default for SeedingPolicy {
    fn default() -> Self {
        Self {
            probability: 0.7,
            pool: 10,
            min_cache: 10,
        }
    }
}

/// Uniform gene value; large integers land on the coarse grid, reals on two
/// decimals.
pub fn random_gene(rng: &mut Rng, p: Parameter) -> f64 {
    let spec = p.spec();
    match spec.kind {
        GeneKind::Integer => {
            let v = rng.i64(spec.low as i64..=spec.high as i64) as f64;
            if v > SNAP_ABOVE {
                snap_to_grid(v)
            } else {
                v
            }
        }
        GeneKind::Real => round2(spec.low + rng.f64() * spec.range()),
    }
}

pub fn random_vector(rng: &mut Rng) -> ParameterVector {
    let mut values = [0.0; GENE_COUNT];
    for p in Parameter::iter() {
        values[p.index()] = random_gene(rng, p);
    }
    ParameterVector::new(values)
}

pub fn seed_vector(
    rng: &mut Rng,
    cache: &ResultCache,
    criterion: &Criterion,
    policy: &SeedingPolicy,
) -> ParameterVector {
    if cache.len() > policy.min_cache && policy.pool > 0 && rng.f64() < policy.probability {
        let elite = cache.top_by(policy.pool, |r| criterion.score(r));
        if !elite.is_empty() {
            return elite[rng.usize(..elite.len())];
        }
    }
    random_vector(rng)
}
