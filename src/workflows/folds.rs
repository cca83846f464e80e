//! Six-fold cross-validation over numbered partitions.

use super::Study;
use crate::cache::{ResultCache, RunStats};
use crate::engine::EngineFactory;
use crate::error::{SynResult, SynoptError};
use crate::evaluation::EvaluationResult;
use crate::optimizer::{
    Criterion, GenerationStats, GeneticOptions, GeneticSearch, ProgressCallback,
};
use crate::params::{ParameterVector, GENE_COUNT};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

pub const FOLD_SIZE: usize = 6;

/// First part of the block of six that contains `part` (parts count from 1).
pub fn fold_start(part: usize) -> usize {
    part - (part - 1) % FOLD_SIZE
}

/// The five other parts of `part`'s block.
pub fn training_parts(part: usize) -> Vec<usize> {
    let start = fold_start(part);
    (start..start + FOLD_SIZE).filter(|&p| p != part).collect()
}

fn check_part(part: usize) -> SynResult<()> {
    if part == 0 {
        return Err(SynoptError::Config("parts are numbered from 1".into()));
    }
    Ok(())
}

/// Ranking used when picking the training winner for validation.
pub fn validation_rank(criterion: &Criterion, r: &EvaluationResult) -> f64 {
    criterion.scalarize(r.rmse, 100.0 * r.ratio)
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub part: usize,
    pub best: Option<(ParameterVector, EvaluationResult)>,
    pub logbook: Vec<GenerationStats>,
    pub session: RunStats,
    pub overall: RunStats,
    pub cached: usize,
    pub stopped_early: bool,
}

/// Trains on the five sibling parts of `part`. The engine defaults are
/// evaluated first so they are always part of the cache.
pub fn train<F, CB>(
    factory: &F,
    study: &Study,
    part: usize,
    criterion: Criterion,
    options: &GeneticOptions,
    callback: &CB,
) -> SynResult<TrainSummary>
where
    F: EngineFactory,
    CB: ProgressCallback + ?Sized,
{
    check_part(part)?;
    let parts = training_parts(part);
    let sources = study.data.partitions(&[study.data.fcode.as_str()], &parts);
    let cache = ResultCache::open(study.cache_path(&part.to_string()))?;

    info!(
        "🚀 Training type {} part {} on parts {:?} ({} cached results)",
        study.data.ship_type,
        part,
        parts,
        cache.len()
    );

    let search = GeneticSearch::new(options.clone())?;
    let (outcome, cache) = study.session(factory, &sources, cache, criterion, |ctx| {
        ctx.evaluate(&ParameterVector::defaults())?;
        let population = search.initial_population(ctx, &[]);
        search.run(ctx, population, callback)
    })?;

    let best = cache.best_by(|r| criterion.score(r));
    if let Some((params, result)) = &best {
        info!(
            "🏆 Best for part {}: {} (rmse {:.3}, ratio {:.4})",
            part, params, result.rmse, result.ratio
        );
    }

    Ok(TrainSummary {
        part,
        best,
        logbook: outcome.logbook,
        session: cache.session_stats(),
        overall: cache.stats(),
        cached: cache.len(),
        stopped_early: outcome.stopped_early,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRow {
    pub label: &'static str,
    pub params: ParameterVector,
    /// Training result, ratio as a fraction.
    pub training: Option<EvaluationResult>,
    pub validation: EvaluationResult,
}

/// Evaluates the defaults and the training winner on the held-out part.
///
/// Returns `Ok(None)` when part `part` has not been trained yet.
pub fn validate<F: EngineFactory>(
    factory: &F,
    study: &Study,
    part: usize,
    criterion: Criterion,
) -> SynResult<Option<Vec<ValidationRow>>> {
    check_part(part)?;
    let training = match ResultCache::load(study.cache_path(&part.to_string())) {
        Err(SynoptError::PersistenceMissing(path)) => {
            info!("No training results at {}, nothing to validate", path.display());
            return Ok(None);
        }
        other => other?,
    };

    let mut candidates = vec![("defaults", ParameterVector::defaults())];
    if let Some((best, _)) = training.best_by(|r| validation_rank(&criterion, r)) {
        candidates.push(("best", best));
    }

    let mut evals = ResultCache::open(study.eval_path(&part.to_string()))?;
    let pending: Vec<ParameterVector> = candidates
        .iter()
        .map(|(_, p)| *p)
        .filter(|p| !evals.contains(p))
        .collect();

    if !pending.is_empty() {
        let sources = vec![study.data.partition_path(&study.data.fcode, &part.to_string())];
        let (_, cache) = study.session(factory, &sources, evals, criterion, |ctx| {
            for p in &pending {
                ctx.measure(p)?;
            }
            Ok(())
        })?;
        evals = cache;
    }

    let rows = candidates
        .into_iter()
        .filter_map(|(label, params)| {
            evals.get(&params).map(|validation| ValidationRow {
                label,
                params,
                training: training.get(&params),
                validation,
            })
        })
        .collect();
    Ok(Some(rows))
}

/// One `parts@criterion@type` item of a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignEntry {
    pub parts: RangeInclusive<usize>,
    pub criterion: Criterion,
    pub ship_type: String,
}

impl FromStr for CampaignEntry {
    type Err = SynoptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |why: &str| SynoptError::Config(format!("bad campaign entry '{}': {}", s, why));

        let fields: Vec<&str> = s.split('@').collect();
        let [part_spec, opt, ship_type] = fields.as_slice() else {
            return Err(bad("expected Part@Opt@Type"));
        };

        let parse_part = |t: &str| t.trim().parse::<usize>().map_err(|_| bad("part is not a number"));
        let parts = match part_spec.split_once('-') {
            Some((lo, hi)) => parse_part(lo)?..=parse_part(hi)?,
            None => {
                let p = parse_part(*part_spec)?;
                p..=p
            }
        };
        if *parts.start() == 0 || parts.is_empty() {
            return Err(bad("part range must be increasing and start at 1 or later"));
        }
        if ship_type.trim().is_empty() {
            return Err(bad("missing ship type"));
        }

        Ok(Self {
            parts,
            criterion: opt.parse()?,
            ship_type: ship_type.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub ship_type: String,
    pub part: usize,
    pub elapsed: Duration,
    pub training: Option<TrainSummary>,
    pub validation: Option<Vec<ValidationRow>>,
}

/// Trains (unless `eval_only`) and validates every part of every entry.
pub fn run_campaign<F, CB>(
    factory: &F,
    base: &Study,
    entries: &[CampaignEntry],
    options: &GeneticOptions,
    eval_only: bool,
    callback: &CB,
) -> SynResult<Vec<CampaignReport>>
where
    F: EngineFactory,
    CB: ProgressCallback + ?Sized,
{
    let mut reports = Vec::new();

    for entry in entries {
        let mut study = base.clone();
        study.data.ship_type = entry.ship_type.clone();

        for part in entry.parts.clone() {
            let started = Instant::now();
            let training = if eval_only {
                None
            } else {
                Some(train(factory, &study, part, entry.criterion, options, callback)?)
            };
            let validation = validate(factory, &study, part, entry.criterion)?;
            let elapsed = started.elapsed();

            info!(
                "⏱️  Type {} part {} done in {:.1}s",
                entry.ship_type,
                part,
                elapsed.as_secs_f64()
            );
            reports.push(CampaignReport {
                ship_type: entry.ship_type.clone(),
                part,
                elapsed,
                training,
                validation,
            });
        }
    }

    Ok(reports)
}

#[derive(Debug, Clone)]
pub struct FoldSummary {
    /// `(part, winner, its training result)` per fold.
    pub winners: Vec<(usize, ParameterVector, EvaluationResult)>,
    pub best: ParameterVector,
    pub best_score: f64,
    pub mean: [f64; GENE_COUNT],
    pub std: [f64; GENE_COUNT],
}

/// Best vector over the six folds starting at `first_part`, plus the per-gene
/// spread of the fold winners. Every fold must have been trained.
pub fn best_of_folds(study: &Study, first_part: usize, criterion: Criterion) -> SynResult<FoldSummary> {
    check_part(first_part)?;
    let mut winners = Vec::with_capacity(FOLD_SIZE);
    let mut best: Option<(ParameterVector, f64)> = None;

    for part in first_part..first_part + FOLD_SIZE {
        let path = study.cache_path(&part.to_string());
        let cache = ResultCache::load(&path)?;
        let (params, result) = cache.best_by(|r| criterion.score(r)).ok_or_else(|| {
            SynoptError::Computation(format!("no results in {}", path.display()))
        })?;

        let score = criterion.score(&result);
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((params, score));
        }
        winners.push((part, params, result));
    }

    let (best, best_score) = best.ok_or_else(|| SynoptError::Computation("no folds".into()))?;

    let n = winners.len() as f64;
    let mut mean = [0.0; GENE_COUNT];
    let mut std = [0.0; GENE_COUNT];
    for (_, p, _) in &winners {
        for (m, v) in mean.iter_mut().zip(p.values()) {
            *m += v / n;
        }
    }
    for (_, p, _) in &winners {
        for ((s, m), v) in std.iter_mut().zip(mean).zip(p.values()) {
            *s += (v - m) * (v - m) / n;
        }
    }
    for s in std.iter_mut() {
        *s = s.sqrt();
    }

    Ok(FoldSummary {
        winners,
        best,
        best_score,
        mean,
        std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, vec![2, 3, 4, 5, 6])]
    #[case(3, vec![1, 2, 4, 5, 6])]
    #[case(6, vec![1, 2, 3, 4, 5])]
    #[case(8, vec![7, 9, 10, 11, 12])]
    fn folds_stay_in_their_block(#[case] part: usize, #[case] expected: Vec<usize>) {
        assert_eq!(training_parts(part), expected);
    }

    #[test]
    fn campaign_entries_parse() {
        let e: CampaignEntry = "1-3@new,2,1@70".parse().unwrap();
        assert_eq!(e.parts, 1..=3);
        assert_eq!(e.criterion, Criterion::New { p: 2.0, q: 1.0 });
        assert_eq!(e.ship_type, "70");

        let single: CampaignEntry = "4@rmse@30".parse().unwrap();
        assert_eq!(single.parts, 4..=4);
    }

    #[rstest]
    #[case("1-3@new,2,1")]
    #[case("3-1@rmse@70")]
    #[case("0@rmse@70")]
    #[case("a@rmse@70")]
    #[case("1@bogus@70")]
    fn bad_campaign_entries(#[case] raw: &str) {
        assert!(matches!(raw.parse::<CampaignEntry>(), Err(SynoptError::Config(_))));
    }
}
