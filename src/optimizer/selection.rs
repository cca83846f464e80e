use crate::params::Individual;
use fastrand::Rng;

#[inline]
fn fitness_of(ind: &Individual) -> f64 {
    ind.fitness.unwrap_or(f64::INFINITY)
}

/// Draws `k` winners of `tournsize`-way tournaments (aspirants picked with
/// replacement), minimizing fitness. Unevaluated individuals always lose.
pub fn tournament(rng: &mut Rng, population: &[Individual], k: usize, tournsize: usize) -> Vec<Individual> {
    if population.is_empty() {
        return Vec::new();
    }
    let size = tournsize.max(1);

    (0..k)
        .map(|_| {
            let mut winner = &population[rng.usize(..population.len())];
            for _ in 1..size {
                let aspirant = &population[rng.usize(..population.len())];
                if fitness_of(aspirant) < fitness_of(winner) {
                    winner = aspirant;
                }
            }
            winner.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterVector;

    fn ind(f: Option<f64>) -> Individual {
        let mut i = Individual::new(ParameterVector::defaults());
        i.fitness = f;
        i
    }

    #[test]
    fn whole_population_tournament_picks_the_minimum() {
        let pop = vec![ind(Some(3.0)), ind(Some(1.0)), ind(None), ind(Some(2.0))];
        let mut rng = Rng::with_seed(11);
        // With 64 aspirants the minimum is almost surely drawn.
        let picked = tournament(&mut rng, &pop, 5, 64);
        assert!(picked.iter().all(|i| i.fitness == Some(1.0)));
    }

    #[test]
    fn selection_size_matches_request() {
        let pop = vec![ind(Some(1.0)), ind(Some(2.0))];
        let mut rng = Rng::with_seed(0);
        assert_eq!(tournament(&mut rng, &pop, 7, 3).len(), 7);
        assert!(tournament(&mut rng, &[], 3, 3).is_empty());
    }
}
