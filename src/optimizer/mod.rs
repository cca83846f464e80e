pub mod criterion;
pub mod crossover;
pub mod initialization;
pub mod mutation;
pub mod runner;
pub mod selection;

pub use self::criterion::Criterion;
pub use self::initialization::SeedingPolicy;
pub use self::runner::{
    GenerationStats, GeneticOptions, GeneticSearch, ProgressCallback, SearchOutcome,
};

use crate::cache::ResultCache;
use crate::engine::{evaluate_with, SynopsesEngine};
use crate::error::SynResult;
use crate::evaluation::{EstimationMode, EvaluationResult};
use crate::params::ParameterVector;
use std::time::Instant;
use tracing::{debug, info};

/// Fitness and measurement assigned to vectors outside the gene bounds.
pub const OUT_OF_BOUNDS: f64 = 1e20;

/// Everything a search mutates: the cache, the random source and the engine.
///
/// Passed explicitly through the generation loop so several searches can
/// share an engine (see [`OptimizerContext::into_parts`]) without globals.
pub struct OptimizerContext<E: SynopsesEngine> {
    pub criterion: Criterion,
    pub mode: EstimationMode,
    cache: ResultCache,
    engine: E,
    rng: fastrand::Rng,
    engine_calls: usize,
}

impl<E: SynopsesEngine> OptimizerContext<E> {
    pub fn new(engine: E, cache: ResultCache, criterion: Criterion, seed: Option<u64>) -> Self {
        let rng = if let Some(s) = seed {
            fastrand::Rng::with_seed(s)
        } else {
            fastrand::Rng::new()
        };

        Self {
            criterion,
            mode: EstimationMode::default(),
            cache,
            engine,
            rng,
            engine_calls: 0,
        }
    }

    pub fn with_mode(mut self, mode: EstimationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }

    /// Swaps in another cache, returning the previous one.
    pub fn replace_cache(&mut self, cache: ResultCache) -> ResultCache {
        std::mem::replace(&mut self.cache, cache)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn rng_mut(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }

    /// Evaluations that reached the engine through this context.
    pub fn engine_calls(&self) -> usize {
        self.engine_calls
    }

    pub fn into_parts(self) -> (ResultCache, E) {
        (self.cache, self.engine)
    }

    /// `(rmse, ratio)` of `params`, from the cache when possible.
    /// Out-of-bounds vectors get `(1e20, 1e20)` and are not cached.
    pub fn measure(&mut self, params: &ParameterVector) -> SynResult<EvaluationResult> {
        if !params.is_within_bounds() {
            debug!("{} is out of bounds", params);
            return Ok(EvaluationResult::new(OUT_OF_BOUNDS, OUT_OF_BOUNDS));
        }

        if let Some(hit) = self.cache.get(params) {
            debug!("Cache hit for {}", params);
            return Ok(hit);
        }

        let started = Instant::now();
        self.engine_calls += 1;
        let result = evaluate_with(&mut self.engine, params, self.mode)?;
        let elapsed = started.elapsed();

        info!(
            "🧪 {} -> rmse {:.3}, ratio {:.4} in {:.1}s",
            params,
            result.rmse,
            result.ratio,
            elapsed.as_secs_f64()
        );
        self.cache.record(*params, result, elapsed)?;
        Ok(result)
    }

    /// Scalar fitness of `params` under the context criterion.
    pub fn evaluate(&mut self, params: &ParameterVector) -> SynResult<f64> {
        if !params.is_within_bounds() {
            return Ok(OUT_OF_BOUNDS);
        }
        let result = self.measure(params)?;
        Ok(self.criterion.score(&result))
    }

    /// Draws one starting vector according to `policy`.
    pub fn seed_vector(&mut self, policy: &SeedingPolicy) -> ParameterVector {
        initialization::seed_vector(&mut self.rng, &self.cache, &self.criterion, policy)
    }

    /// The best cached vector under the context criterion.
    pub fn best(&self) -> Option<(ParameterVector, EvaluationResult)> {
        let criterion = self.criterion;
        self.cache.best_by(|r| criterion.score(r))
    }

    /// The `k` best cached vectors under the context criterion.
    pub fn top(&self, k: usize) -> Vec<ParameterVector> {
        let criterion = self.criterion;
        self.cache.top_by(k, |r| criterion.score(r))
    }
}
