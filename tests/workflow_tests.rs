mod common;

use common::{FakeFactory, TestContext};
use synopt::cache::ResultCache;
use synopt::error::SynoptError;
use synopt::optimizer::{Criterion, GenerationStats, GeneticOptions};
use synopt::params::ParameterVector;
use synopt::workflows::folds::{best_of_folds, run_campaign, train, validate, CampaignEntry};
use synopt::workflows::online::{evaluate_online, train_online, OnlineSchedule};
use synopt::workflows::sweep::{bounds_report, sweep};

fn quiet(_: &GenerationStats) -> bool {
    true
}

fn tiny() -> GeneticOptions {
    GeneticOptions {
        ngen: 1,
        pops: 3,
        ..Default::default()
    }
}

#[test]
fn training_uses_the_five_sibling_parts() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();

    let summary = train(&factory, &ctx.study, 3, Criterion::Rmse, &tiny(), &quiet).unwrap();

    let sources = factory.last_sources();
    assert_eq!(sources.len(), 5);
    assert!(sources.iter().all(|p| !p.ends_with("month3.csv")));
    assert_eq!((factory.opened(), factory.closed()), (1, 1));

    assert_eq!(summary.logbook.len(), 2);
    assert!(summary.best.is_some());
    let cache = ResultCache::load(ctx.study.cache_path("3")).unwrap();
    assert!(cache.contains(&ParameterVector::defaults()));
    assert_eq!(cache.len(), summary.cached);
    assert_eq!(cache.len(), factory.calls());
}

#[test]
fn retraining_reuses_the_saved_results() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();

    train(&factory, &ctx.study, 2, Criterion::Rmse, &tiny(), &quiet).unwrap();
    let after_first = factory.calls();
    let summary = train(&factory, &ctx.study, 2, Criterion::Rmse, &tiny(), &quiet).unwrap();

    // Same seed, same cache: nothing new to evaluate
    assert_eq!(factory.calls(), after_first);
    assert_eq!(summary.session.run_count, 0);
    assert_eq!(summary.overall.run_count as usize, after_first);
}

#[test]
fn failed_engine_is_still_closed() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::failing();

    let err = train(&factory, &ctx.study, 1, Criterion::Rmse, &tiny(), &quiet).unwrap_err();
    assert!(matches!(err, SynoptError::EngineInvocation { .. }));
    assert_eq!((factory.opened(), factory.closed()), (1, 1));
}

#[test]
fn part_zero_is_rejected() {
    let ctx = TestContext::new();
    let factory = FakeFactory::default();
    let err = train(&factory, &ctx.study, 0, Criterion::Rmse, &tiny(), &quiet).unwrap_err();
    assert!(matches!(err, SynoptError::Config(_)));
    assert_eq!(factory.opened(), 0);
}

#[test]
fn validation_scores_defaults_and_winner_on_the_held_out_part() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();
    train(&factory, &ctx.study, 4, Criterion::Rmse, &tiny(), &quiet).unwrap();

    let rows = validate(&factory, &ctx.study, 4, Criterion::Rmse).unwrap().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].label, "defaults");
    assert_eq!(rows[0].params, ParameterVector::defaults());
    assert!(rows.iter().all(|r| r.training.is_some()));

    let sources = factory.last_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].ends_with("month4.csv"));
    assert!(ctx.study.eval_path("4").exists());

    let opened = factory.opened();
    let again = validate(&factory, &ctx.study, 4, Criterion::Rmse).unwrap().unwrap();
    assert_eq!(again, rows);
    assert_eq!(factory.opened(), opened, "stored validations are reused");
}

#[test]
fn validating_an_untrained_part_is_a_no_op() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();

    assert!(validate(&factory, &ctx.study, 5, Criterion::Rmse).unwrap().is_none());
    assert_eq!(factory.opened(), 0);
    assert!(!ctx.study.eval_path("5").exists());
}

#[test]
fn fold_summary_needs_every_fold() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();
    train(&factory, &ctx.study, 1, Criterion::Rmse, &tiny(), &quiet).unwrap();

    assert!(matches!(
        best_of_folds(&ctx.study, 1, Criterion::Rmse),
        Err(SynoptError::PersistenceMissing(_))
    ));

    for part in 2..=6 {
        train(&factory, &ctx.study, part, Criterion::Rmse, &tiny(), &quiet).unwrap();
    }
    let summary = best_of_folds(&ctx.study, 1, Criterion::Rmse).unwrap();

    assert_eq!(summary.winners.len(), 6);
    let parts: Vec<usize> = summary.winners.iter().map(|(p, _, _)| *p).collect();
    assert_eq!(parts, vec![1, 2, 3, 4, 5, 6]);
    assert!(summary.winners.iter().any(|(_, p, _)| *p == summary.best));
    assert!(summary
        .winners
        .iter()
        .all(|(_, _, r)| Criterion::Rmse.score(r) >= summary.best_score));
    assert!(summary.std.iter().all(|s| *s >= 0.0));
}

#[test]
fn campaign_trains_and_validates_each_part() {
    let ctx = TestContext::new().with_cross_parts();
    let factory = FakeFactory::default();
    let entries: Vec<CampaignEntry> = vec![
        "1-2@rmse@70".parse().unwrap(),
        "3@mult,1@80".parse().unwrap(),
    ];

    let reports = run_campaign(&factory, &ctx.study, &entries[..1], &tiny(), false, &quiet).unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.training.is_some() && r.validation.is_some()));

    // Type 80 has neither data nor results
    let eval_only = run_campaign(&factory, &ctx.study, &entries[1..], &tiny(), true, &quiet).unwrap();
    assert_eq!(eval_only.len(), 1);
    assert!(eval_only[0].training.is_none() && eval_only[0].validation.is_none());
}

#[test]
fn online_training_carries_results_forward() {
    let ctx = TestContext::new().with_segments();
    let factory = FakeFactory::default();
    let schedule = OnlineSchedule::parse("4,3", "1").unwrap();

    let reports = train_online(&factory, &ctx.study, Criterion::Rmse, &schedule, &tiny(), 0, &quiet).unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.segment.as_str()).collect();
    assert_eq!(names, vec!["month1", "month2", "month3", "month4", "month5"]);

    // Segment m trains on every part of segments 0..=m
    assert_eq!(factory.last_sources().len(), 5 * 6);
    assert_eq!(factory.opened(), factory.closed());

    let month2 = ResultCache::load(ctx.study.segment_path("month2")).unwrap();
    assert_eq!(month2.history().len(), 2);
    assert!(month2.history().iter().all(|g| g.len() == 3));

    let rows = evaluate_online(&factory, &ctx.study, Criterion::Rmse).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!((rows[0].trained_on.as_str(), rows[0].evaluated_on.as_str()), ("month1", "month2"));
    assert!(ctx.study.segment_eval_path("month6").exists());

    let opened = factory.opened();
    let again = evaluate_online(&factory, &ctx.study, Criterion::Rmse).unwrap();
    assert_eq!(again, rows);
    assert_eq!(factory.opened(), opened);

    let resumed = train_online(&factory, &ctx.study, Criterion::Rmse, &schedule, &tiny(), 4, &quiet).unwrap();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].segment, "month5");
}

#[test]
fn resuming_without_the_previous_segment_fails() {
    let ctx = TestContext::new().with_segments();
    let factory = FakeFactory::default();
    let schedule = OnlineSchedule::parse("3", "1").unwrap();

    let err = train_online(&factory, &ctx.study, Criterion::Rmse, &schedule, &tiny(), 3, &quiet).unwrap_err();
    assert!(matches!(err, SynoptError::PersistenceMissing(p) if p.ends_with("month3.json")));
    assert_eq!(factory.opened(), 0);
}

#[test]
fn sweep_shares_one_engine_and_feeds_the_bounds_report() {
    let ctx = TestContext::new().with_unpartitioned();
    let factory = FakeFactory::default();

    let cells = sweep(&factory, &ctx.study, &tiny(), &quiet).unwrap();
    assert_eq!(cells.len(), 36);
    assert!(cells.iter().all(|c| c.best.is_some()));
    assert_eq!((factory.opened(), factory.closed()), (1, 1));
    assert!(factory.last_sources()[0].ends_with("month.csv"));

    let (grid, loose) = bounds_report(&ctx.study, f64::MAX, 1000.0).unwrap();
    assert_eq!(loose.len(), grid.len());
    assert!(loose.iter().all(|c| c.satisfied));

    let (_, strict) = bounds_report(&ctx.study, 0.0, 1000.0).unwrap();
    assert!(strict.iter().all(|c| !c.satisfied));
}

#[test]
fn bounds_without_a_sweep_is_an_error() {
    let ctx = TestContext::new();
    assert!(matches!(
        bounds_report(&ctx.study, 10.0, 10.0),
        Err(SynoptError::PersistenceMissing(_))
    ));
}
