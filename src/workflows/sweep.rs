//! Grid search over the `new,n,x` criterion family on the unpartitioned file.

use super::Study;
use crate::cache::ResultCache;
use crate::engine::EngineFactory;
use crate::error::{SynResult, SynoptError};
use crate::evaluation::EvaluationResult;
use crate::optimizer::{Criterion, GeneticOptions, GeneticSearch, ProgressCallback};
use crate::params::ParameterVector;
use tracing::info;

/// Offsets `x` and exponents `n` tried by a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperGrid {
    pub xs: Vec<f64>,
    pub ns: Vec<f64>,
}

impl HyperGrid {
    /// Cells in row order: `x` outer, `n` inner.
    pub fn cells(&self) -> impl Iterator<Item = (f64, f64, Criterion)> + '_ {
        self.xs.iter().flat_map(move |&x| {
            self.ns
                .iter()
                .map(move |&n| (x, n, Criterion::New { p: n, q: x }))
        })
    }

    pub fn len(&self) -> usize {
        self.xs.len() * self.ns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn grid(dataset: &str) -> SynResult<HyperGrid> {
    match dataset {
        "brest" => Ok(HyperGrid {
            xs: vec![2.0, 4.0, 7.0, 10.0, 13.0, 17.0],
            ns: vec![0.7, 0.8, 1.0, 1.2, 1.4, 1.6],
        }),
        "mtraffic" => Ok(HyperGrid {
            xs: vec![16.0, 24.0, 32.0, 42.0, 52.0, 62.0, 74.0, 88.0],
            ns: vec![0.3, 0.45, 0.6, 0.75, 1.0, 1.3, 1.65, 2.0],
        }),
        other => Err(SynoptError::Config(format!("wrong dataset '{}'", other))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepCell {
    pub x: f64,
    pub n: f64,
    pub best: Option<(ParameterVector, f64)>,
}

/// Runs one search per grid cell against a single engine and a shared
/// cache at `{fcode}.json`.
pub fn sweep<F, CB>(
    factory: &F,
    study: &Study,
    options: &GeneticOptions,
    callback: &CB,
) -> SynResult<Vec<SweepCell>>
where
    F: EngineFactory,
    CB: ProgressCallback + ?Sized,
{
    let grid = grid(&study.data.dataset)?;
    let sources = vec![study.data.unpartitioned()];
    let cache = ResultCache::open(study.cache_path(""))?;
    let search = GeneticSearch::new(options.clone())?;

    info!("🔎 Sweeping {} cells over {}", grid.len(), sources[0].display());

    let first = grid
        .cells()
        .next()
        .map(|(_, _, c)| c)
        .unwrap_or(Criterion::Rmse);

    let (cells, cache) = study.session(factory, &sources, cache, first, |ctx| {
        let mut cells = Vec::with_capacity(grid.len());
        for (x, n, criterion) in grid.cells() {
            ctx.criterion = criterion;
            info!("Cell x={} n={}", x, n);
            let population = search.initial_population(ctx, &[]);
            let outcome = search.run(ctx, population, callback)?;
            cells.push(SweepCell {
                x,
                n,
                best: outcome.best,
            });
        }
        Ok(cells)
    })?;

    let stats = cache.session_stats();
    if let Some(avg) = stats.average_seconds() {
        info!("Average engine time this run: {:.1}s over {} runs", avg, stats.run_count);
    }
    Ok(cells)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundsCell {
    pub x: f64,
    pub n: f64,
    pub result: EvaluationResult,
    /// `rmse < max_rmse` and `100 * ratio < max_ratio`.
    pub satisfied: bool,
}

/// Which grid cells pick a winner inside the given bounds.
pub fn bounds_report(study: &Study, max_rmse: f64, max_ratio: f64) -> SynResult<(HyperGrid, Vec<BoundsCell>)> {
    let grid = grid(&study.data.dataset)?;
    let path = study.cache_path("");
    let cache = ResultCache::load(&path)?;
    if cache.is_empty() {
        return Err(SynoptError::Computation(format!("no results in {}", path.display())));
    }

    let mut cells = Vec::with_capacity(grid.len());
    for (x, n, criterion) in grid.cells() {
        if let Some((_, result)) = cache.best_by(|r| criterion.score(r)) {
            cells.push(BoundsCell {
                x,
                n,
                result,
                satisfied: result.rmse < max_rmse && 100.0 * result.ratio < max_ratio,
            });
        }
    }
    Ok((grid, cells))
}
