use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::config::{EngineSettings, SearchParams};
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::optimizer::{Criterion, GeneticOptions};
use synopt::workflows::online::{self, OnlineSchedule};
use synopt::workflows::ONLINE_SAVE_ROOT;

#[derive(Args, Debug, Clone)]
pub struct OnlineArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long, default_value = "rmse")]
    pub opt: Criterion,

    /// Population size per segment, comma separated (last value repeats)
    #[arg(long)]
    pub popsizes: Option<String>,

    /// Generations per segment, comma separated (last value repeats)
    #[arg(long)]
    pub gennumbers: Option<String>,

    /// Segments to skip; the skipped segment's saved results seed the first one
    #[arg(short, long, default_value_t = 0)]
    pub start_from: usize,

    #[command(flatten)]
    pub search: SearchParams,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: OnlineArgs, engine: EngineSettings) -> SynResult<()> {
    let study = args.study.study(ONLINE_SAVE_ROOT, args.search.seed);
    let pops = args
        .popsizes
        .clone()
        .unwrap_or_else(|| args.search.pops.to_string());
    let ngen = args
        .gennumbers
        .clone()
        .unwrap_or_else(|| args.search.ngen.to_string());
    let schedule = OnlineSchedule::parse(&pops, &ngen)?;

    let options = GeneticOptions::from(&args.search);
    let factory = ProcessEngineFactory::new(engine);
    let progress = reports::ConsoleProgress::new(schedule.ngen_for(args.start_from));

    let segments = online::train_online(
        &factory,
        &study,
        args.opt,
        &schedule,
        &options,
        args.start_from,
        &progress,
    )?;

    reports::print_segments(&segments);
    Ok(())
}
