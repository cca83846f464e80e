use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::config::{EngineSettings, SearchParams};
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::optimizer::GeneticOptions;
use synopt::workflows::{sweep, CROSS_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long, default_value_t = 10)]
    pub ngen: usize,

    #[arg(long, default_value_t = 10)]
    pub pops: usize,

    #[arg(long, default_value_t = 0.4)]
    pub elite_probability: f64,

    #[arg(long, default_value_t = 15)]
    pub elite_pool: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: SweepArgs, engine: EngineSettings) -> SynResult<()> {
    let study = args.study.study(CROSS_SAVE_ROOT, args.seed);
    let search = SearchParams {
        ngen: args.ngen,
        pops: args.pops,
        elite_probability: args.elite_probability,
        elite_pool: args.elite_pool,
        seed: args.seed,
        ..SearchParams::default()
    };
    let options = GeneticOptions::from(&search);
    let factory = ProcessEngineFactory::new(engine);
    let progress = reports::ConsoleProgress::new(options.ngen);

    let cells = sweep::sweep(&factory, &study, &options, &progress)?;
    reports::print_sweep(&cells);
    Ok(())
}
