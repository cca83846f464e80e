//! Temporal training: each segment trains on everything seen so far and
//! starts from the previous segment's best vectors.

use super::Study;
use crate::cache::ResultCache;
use crate::config::parse_usize_list;
use crate::engine::EngineFactory;
use crate::error::{SynResult, SynoptError};
use crate::evaluation::EvaluationResult;
use crate::optimizer::{
    Criterion, GenerationStats, GeneticOptions, GeneticSearch, ProgressCallback, OUT_OF_BOUNDS,
};
use crate::params::ParameterVector;
use std::time::{Duration, Instant};
use tracing::info;

/// Parts every segment is split into.
pub const SEGMENT_PARTS: [usize; 6] = [1, 2, 3, 4, 5, 6];

/// Time-ordered segment names of a dataset.
pub fn segments(dataset: &str) -> SynResult<&'static [&'static str]> {
    match dataset {
        "mtraffic" => Ok(&["march", "april", "may", "june", "july", "august"]),
        "brest" => Ok(&["month1", "month2", "month3", "month4", "month5", "month6"]),
        other => Err(SynoptError::Config(format!(
            "dataset '{}' has no segment layout",
            other
        ))),
    }
}

/// Per-segment population sizes and generation counts; the last value of a
/// list applies to every later segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineSchedule {
    pub pops: Vec<usize>,
    pub ngen: Vec<usize>,
}

impl OnlineSchedule {
    pub fn parse(pops: &str, ngen: &str) -> SynResult<Self> {
        Ok(Self {
            pops: parse_usize_list(pops, "popsizes")?,
            ngen: parse_usize_list(ngen, "gennumbers")?,
        })
    }

    fn pick(list: &[usize], m: usize) -> usize {
        list.get(m).or_else(|| list.last()).copied().unwrap_or_default()
    }

    pub fn pops_for(&self, m: usize) -> usize {
        Self::pick(&self.pops, m)
    }

    pub fn ngen_for(&self, m: usize) -> usize {
        Self::pick(&self.ngen, m)
    }
}

#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub segment: String,
    pub best: Option<(ParameterVector, EvaluationResult)>,
    pub logbook: Vec<GenerationStats>,
    pub evaluated: usize,
    pub elapsed: Duration,
}

/// Trains segments `start_from .. len-1`. Segment `m` trains on parts 1..6 of
/// segments `0..=m` and saves to `{segment}.json` with a fresh result set.
pub fn train_online<F, CB>(
    factory: &F,
    study: &Study,
    criterion: Criterion,
    schedule: &OnlineSchedule,
    base: &GeneticOptions,
    start_from: usize,
    callback: &CB,
) -> SynResult<Vec<SegmentReport>>
where
    F: EngineFactory,
    CB: ProgressCallback + ?Sized,
{
    let segs = segments(&study.data.dataset)?;
    let mut carried: Vec<ParameterVector> = Vec::new();

    if start_from > 0 && start_from < segs.len() {
        let previous = ResultCache::load(study.segment_path(segs[start_from - 1]))?;
        carried = previous
            .ranked_by(|r| criterion.score(r))
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        info!("Resuming from {} with {} ranked vectors", segs[start_from - 1], carried.len());
    }

    let mut reports = Vec::new();
    for m in start_from..segs.len().saturating_sub(1) {
        let segment = segs[m];
        let sources = study.data.partitions(&segs[..=m], &SEGMENT_PARTS);
        let options = GeneticOptions {
            pops: schedule.pops_for(m),
            ngen: schedule.ngen_for(m),
            record_history: true,
            ..base.clone()
        };
        let search = GeneticSearch::new(options)?;

        info!(
            "🚀 Online segment {} ({} files, pops {}, ngen {})",
            segment,
            sources.len(),
            search.options().pops,
            search.options().ngen
        );

        let started = Instant::now();
        let cache = ResultCache::create(study.segment_path(segment));
        let (outcome, cache) = study.session(factory, &sources, cache, criterion, |ctx| {
            let population = search.initial_population(ctx, &carried);
            search.run(ctx, population, callback)
        })?;
        let elapsed = started.elapsed();

        if cache.is_empty() {
            return Err(SynoptError::Computation(format!(
                "no results for segment {}",
                segment
            )));
        }
        cache.save()?;

        carried = cache
            .ranked_by(|r| criterion.score(r))
            .into_iter()
            .map(|(p, _)| p)
            .collect();

        reports.push(SegmentReport {
            segment: segment.to_string(),
            best: cache.best_by(|r| criterion.score(r)),
            logbook: outcome.logbook,
            evaluated: cache.len(),
            elapsed,
        });
    }

    Ok(reports)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnlineEvalRow {
    pub trained_on: String,
    pub evaluated_on: String,
    pub params: ParameterVector,
    pub result: EvaluationResult,
}

/// Scores each segment's winner on the following segment, reusing results
/// already stored in `{next}_eval.json`.
pub fn evaluate_online<F: EngineFactory>(
    factory: &F,
    study: &Study,
    criterion: Criterion,
) -> SynResult<Vec<OnlineEvalRow>> {
    let segs = segments(&study.data.dataset)?;
    let mut rows = Vec::new();

    for pair in segs.windows(2) {
        let (trained_on, next) = (pair[0], pair[1]);
        let path = study.segment_path(trained_on);
        let trained = ResultCache::load(&path)?;
        let (best, _) = trained
            .best_by(|r| criterion.score(r))
            .ok_or_else(|| SynoptError::Computation(format!("no results in {}", path.display())))?;

        let mut evals = ResultCache::open(study.segment_eval_path(next))?;
        if !evals.contains(&best) {
            if best.is_within_bounds() {
                let sources = study.data.partitions(&[next], &SEGMENT_PARTS);
                let (_, cache) = study.session(factory, &sources, evals, criterion, |ctx| {
                    ctx.measure(&best)
                })?;
                evals = cache;
            } else {
                evals.record(
                    best,
                    EvaluationResult::new(OUT_OF_BOUNDS, OUT_OF_BOUNDS),
                    Duration::ZERO,
                )?;
            }
        }

        if let Some(result) = evals.get(&best) {
            info!("📈 {} winner on {}: rmse {:.3}, ratio {:.4}", trained_on, next, result.rmse, result.ratio);
            rows.push(OnlineEvalRow {
                trained_on: trained_on.to_string(),
                evaluated_on: next.to_string(),
                params: best,
                result,
            });
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_repeats_last_value() {
        let s = OnlineSchedule::parse("15,10", "7").unwrap();
        assert_eq!((s.pops_for(0), s.pops_for(1), s.pops_for(4)), (15, 10, 10));
        assert_eq!(s.ngen_for(3), 7);
    }

    #[test]
    fn unknown_dataset_has_no_segments() {
        assert_eq!(segments("brest").unwrap().len(), 6);
        assert!(matches!(segments("piraeus"), Err(SynoptError::Config(_))));
    }
}
