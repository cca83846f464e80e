use super::crossover::one_point;
use super::mutation::GaussianMutator;
use super::selection::tournament;
use super::{OptimizerContext, SeedingPolicy};
use crate::config::SearchParams;
use crate::engine::SynopsesEngine;
use crate::error::SynResult;
use crate::params::{Individual, ParameterVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct GeneticOptions {
    pub ngen: usize,
    pub pops: usize,
    pub cxpb: f64,
    pub mutpb: f64,
    pub indpb: f64,
    pub tournament_size: usize,
    pub seeding: SeedingPolicy,
    /// Append every generation's population to the cache history.
    pub record_history: bool,
}

impl From<&SearchParams> for GeneticOptions {
    fn from(p: &SearchParams) -> Self {
        Self {
            ngen: p.ngen,
            pops: p.pops,
            cxpb: p.cxpb,
            mutpb: p.mutpb,
            indpb: p.indpb,
            tournament_size: p.tournament_size,
            seeding: SeedingPolicy {
                probability: p.elite_probability,
                pool: p.elite_pool,
                ..SeedingPolicy::default()
            },
            record_history: false,
        }
    }
}

impl Default for GeneticOptions {
    fn default() -> Self {
        Self::from(&SearchParams::default())
    }
}

/// One logbook row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub evaluations: usize,
    pub min: f64,
    pub avg: f64,
    pub std: f64,
    pub max: f64,
}

impl GenerationStats {
    /// Population statistics over evaluated individuals.
    pub fn compute(generation: usize, evaluations: usize, population: &[Individual]) -> Self {
        let fits: Vec<f64> = population.iter().filter_map(|i| i.fitness).collect();
        if fits.is_empty() {
            return Self {
                generation,
                evaluations,
                min: f64::NAN,
                avg: f64::NAN,
                std: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = fits.len() as f64;
        let avg = fits.iter().sum::<f64>() / n;
        let var = fits.iter().map(|f| (f - avg) * (f - avg)).sum::<f64>() / n;

        Self {
            generation,
            evaluations,
            min: fits.iter().copied().fold(f64::INFINITY, f64::min),
            avg,
            std: var.sqrt(),
            max: fits.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Receives the logbook row after each generation.
/// Returning `false` stops the search after the current generation.
pub trait ProgressCallback {
    fn on_generation(&self, stats: &GenerationStats) -> bool;
}

impl<F: Fn(&GenerationStats) -> bool> ProgressCallback for F {
    fn on_generation(&self, stats: &GenerationStats) -> bool {
        self(stats)
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub population: Vec<Individual>,
    pub logbook: Vec<GenerationStats>,
    /// Lowest-fitness individual seen in any generation.
    pub best: Option<(ParameterVector, f64)>,
    pub stopped_early: bool,
}

/// Generational GA: tournament selection, then crossover and mutation on
/// the selected copies, full replacement.
pub struct GeneticSearch {
    options: GeneticOptions,
    mutator: GaussianMutator,
}

impl GeneticSearch {
    pub fn new(options: GeneticOptions) -> SynResult<Self> {
        let mutator = GaussianMutator::new(options.indpb)?;
        Ok(Self { options, mutator })
    }

    pub fn options(&self) -> &GeneticOptions {
        &self.options
    }

    /// `seeds` first (at most `pops` of them), the rest drawn with the
    /// seeding policy.
    pub fn initial_population<E: SynopsesEngine>(
        &self,
        ctx: &mut OptimizerContext<E>,
        seeds: &[ParameterVector],
    ) -> Vec<Individual> {
        let mut population: Vec<Individual> = seeds
            .iter()
            .take(self.options.pops)
            .map(|p| Individual::new(*p))
            .collect();

        while population.len() < self.options.pops {
            population.push(Individual::new(ctx.seed_vector(&self.options.seeding)));
        }
        population
    }

    pub fn run<E: SynopsesEngine, CB: ProgressCallback + ?Sized>(
        &self,
        ctx: &mut OptimizerContext<E>,
        mut population: Vec<Individual>,
        callback: &CB,
    ) -> SynResult<SearchOutcome> {
        let opts = &self.options;
        let mut logbook = Vec::with_capacity(opts.ngen + 1);
        let mut best: Option<(ParameterVector, f64)> = None;

        let evals = evaluate_invalid(ctx, &mut population)?;
        track_best(&mut best, &population);
        let stats = GenerationStats::compute(0, evals, &population);
        self.record(ctx, &population, stats, &mut logbook)?;

        if !callback.on_generation(&stats) {
            return Ok(SearchOutcome {
                population,
                logbook,
                best,
                stopped_early: true,
            });
        }

        for generation in 1..=opts.ngen {
            let selected = {
                let rng = ctx.rng_mut();
                tournament(rng, &population, population.len(), opts.tournament_size)
            };
            let mut offspring = self.vary(ctx.rng_mut(), selected);

            let evals = evaluate_invalid(ctx, &mut offspring)?;
            population = offspring;
            track_best(&mut best, &population);

            let stats = GenerationStats::compute(generation, evals, &population);
            self.record(ctx, &population, stats, &mut logbook)?;

            if !callback.on_generation(&stats) {
                info!("🛑 Search stopped after generation {}", generation);
                return Ok(SearchOutcome {
                    population,
                    logbook,
                    best,
                    stopped_early: true,
                });
            }
        }

        Ok(SearchOutcome {
            population,
            logbook,
            best,
            stopped_early: false,
        })
    }

    /// Pairwise crossover with `cxpb`, then per-individual mutation with `mutpb`.
    fn vary(&self, rng: &mut fastrand::Rng, mut offspring: Vec<Individual>) -> Vec<Individual> {
        for i in (1..offspring.len()).step_by(2) {
            if rng.f64() < self.options.cxpb {
                let (head, tail) = offspring.split_at_mut(i);
                one_point(rng, &mut head[i - 1], &mut tail[0]);
            }
        }

        for ind in offspring.iter_mut() {
            if rng.f64() < self.options.mutpb {
                self.mutator.mutate(rng, ind);
            }
        }
        offspring
    }

    fn record<E: SynopsesEngine>(
        &self,
        ctx: &mut OptimizerContext<E>,
        population: &[Individual],
        stats: GenerationStats,
        logbook: &mut Vec<GenerationStats>,
    ) -> SynResult<()> {
        debug!(
            "gen {:>3} | evals {:>3} | min {:.4} | avg {:.4} | std {:.4} | max {:.4}",
            stats.generation, stats.evaluations, stats.min, stats.avg, stats.std, stats.max
        );
        logbook.push(stats);

        if self.options.record_history {
            let snapshot = population.iter().map(|i| *i.params()).collect();
            ctx.cache_mut().push_generation(snapshot)?;
        }
        Ok(())
    }
}

fn evaluate_invalid<E: SynopsesEngine>(
    ctx: &mut OptimizerContext<E>,
    population: &mut [Individual],
) -> SynResult<usize> {
    let mut evals = 0;
    for ind in population.iter_mut().filter(|i| i.fitness.is_none()) {
        ind.fitness = Some(ctx.evaluate(ind.params())?);
        evals += 1;
    }
    Ok(evals)
}

fn track_best(best: &mut Option<(ParameterVector, f64)>, population: &[Individual]) {
    for ind in population {
        if let Some(f) = ind.fitness {
            match best {
                Some((_, b)) if *b <= f => {}
                _ => *best = Some((*ind.params(), f)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_use_population_std() {
        let pop: Vec<Individual> = [1.0, 3.0]
            .iter()
            .map(|f| {
                let mut i = Individual::new(ParameterVector::defaults());
                i.fitness = Some(*f);
                i
            })
            .collect();
        let s = GenerationStats::compute(2, 1, &pop);
        assert_eq!((s.min, s.avg, s.std, s.max), (1.0, 2.0, 1.0, 3.0));
    }

    #[test]
    fn options_follow_search_params() {
        let params = SearchParams {
            elite_probability: 0.4,
            elite_pool: 15,
            ..Default::default()
        };
        let opts = GeneticOptions::from(&params);
        assert_eq!(opts.seeding.probability, 0.4);
        assert_eq!(opts.seeding.pool, 15);
        assert_eq!(opts.seeding.min_cache, 10);
    }
}
