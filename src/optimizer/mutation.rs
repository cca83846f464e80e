use crate::error::{SynResult, SynoptError};
use crate::params::{round2, snap_to_grid, GeneKind, Individual, Parameter, ParameterVector, SNAP_ABOVE};
use fastrand::Rng;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use strum::IntoEnumIterator;

/// Lets `rand_distr` sample from a borrowed fastrand generator.
pub struct FastRngCore<'a>(pub &'a mut Rng);

impl RngCore for FastRngCore<'_> {
    fn next_u32(&mut self) -> u32 {
        self.0.u32(..)
    }

    fn next_u64(&mut self) -> u64 {
        self.0.u64(..)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.fill(dest);
        Ok(())
    }
}

/// Per-gene gaussian perturbation with `sigma = range / 4`.
#[derive(Debug, Clone)]
pub struct GaussianMutator {
    normals: Vec<Normal<f64>>,
    indpb: f64,
}

impl GaussianMutator {
    pub fn new(indpb: f64) -> SynResult<Self> {
        let normals = Parameter::iter()
            .map(|p| {
                Normal::new(0.0, p.spec().range() / 4.0)
                    .map_err(|e| SynoptError::Config(format!("bad sigma for {}: {}", p, e)))
            })
            .collect::<SynResult<Vec<_>>>()?;

        Ok(Self { normals, indpb })
    }

    /// Mutated integer genes are truncated, clamped and snapped above 200;
    /// mutated reals are rounded to two decimals and clamped.
    pub fn mutate(&self, rng: &mut Rng, ind: &mut Individual) {
        let mut values = ind.params().values();

        for (p, normal) in Parameter::iter().zip(&self.normals) {
            if rng.f64() >= self.indpb {
                continue;
            }
            let spec = p.spec();
            let noisy = values[p.index()] + normal.sample(&mut FastRngCore(&mut *rng));

            values[p.index()] = match spec.kind {
                GeneKind::Integer => {
                    let v = spec.clamp(noisy.trunc());
                    if v > SNAP_ABOVE {
                        spec.clamp(snap_to_grid(v))
                    } else {
                        v
                    }
                }
                GeneKind::Real => spec.clamp(round2(noisy)),
            };
        }

        ind.set_params(ParameterVector::new(values));
        ind.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_keeps_bounds_and_grid() {
        let mutator = GaussianMutator::new(1.0).unwrap();
        let mut rng = Rng::with_seed(99);
        let mut ind = Individual::new(ParameterVector::defaults());

        for _ in 0..1000 {
            ind.fitness = Some(0.0);
            mutator.mutate(&mut rng, &mut ind);
            assert!(ind.fitness.is_none());
            let v = ind.params();
            assert!(v.is_within_bounds(), "{}", v);
            for p in [Parameter::GapPeriod, Parameter::HistoryPeriod] {
                let x = v.get(p);
                assert_eq!(x.fract(), 0.0);
                if x > SNAP_ABOVE {
                    assert_eq!(x % 50.0, 0.0, "{} = {}", p, x);
                }
            }
        }
    }

    #[test]
    fn zero_indpb_leaves_genes_alone() {
        let mutator = GaussianMutator::new(0.0).unwrap();
        let mut rng = Rng::with_seed(1);
        let mut ind = Individual::new(ParameterVector::defaults());
        mutator.mutate(&mut rng, &mut ind);
        assert_eq!(*ind.params(), ParameterVector::defaults());
    }
}
