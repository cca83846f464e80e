use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::config::{EngineSettings, SearchParams};
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::optimizer::{Criterion, GeneticOptions};
use synopt::workflows::{folds, CROSS_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// Held-out part; training uses the other five parts of its block
    #[arg(short, long)]
    pub part: usize,

    /// Optimization criterion (rmse | mult,p | new,p,q | max,p,q | thresh,r)
    #[arg(long, default_value = "rmse")]
    pub opt: Criterion,

    #[command(flatten)]
    pub search: SearchParams,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: TrainArgs, engine: EngineSettings) -> SynResult<()> {
    let study = args.study.study(CROSS_SAVE_ROOT, args.search.seed);
    let factory = ProcessEngineFactory::new(engine);
    let options = GeneticOptions::from(&args.search);

    println!(
        "\n🧬 Training type {} part {} (ngen {}, pops {}, {})",
        study.data.ship_type, args.part, options.ngen, options.pops, args.opt
    );

    let progress = reports::ConsoleProgress::new(options.ngen);
    let summary = folds::train(&factory, &study, args.part, args.opt, &options, &progress)?;

    reports::print_logbook(&summary.logbook);
    reports::print_train_summary(&summary);
    Ok(())
}
