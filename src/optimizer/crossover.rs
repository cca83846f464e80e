use crate::params::{Individual, GENE_COUNT};
use fastrand::Rng;

/// Single-point crossover at a cut in `1..GENE_COUNT`. Both children lose
/// their fitness.
pub fn one_point(rng: &mut Rng, a: &mut Individual, b: &mut Individual) {
    let cut = rng.usize(1..GENE_COUNT);
    let left = a.params().splice(b.params(), cut);
    let right = b.params().splice(a.params(), cut);

    a.set_params(left);
    b.set_params(right);
    a.invalidate();
    b.invalidate();
}
