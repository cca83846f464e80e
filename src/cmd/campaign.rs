use crate::reports;
use clap::Args;
use std::path::PathBuf;
use synopt::config::{DataSource, EngineSettings, SearchParams};
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::evaluation::EstimationMode;
use synopt::optimizer::GeneticOptions;
use synopt::workflows::folds::{self, CampaignEntry};
use synopt::workflows::{Study, CROSS_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct CampaignArgs {
    /// Entries of the form `Part@Opt@Type`, where Part is `n` or `x-y`
    #[arg(required = true, num_args = 1..)]
    pub entries: Vec<CampaignEntry>,

    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub dataset: String,

    #[arg(long, default_value = "month")]
    pub fcode: String,

    #[arg(long, default_value = CROSS_SAVE_ROOT)]
    pub save_root: PathBuf,

    #[arg(long, default_value = "interpolate")]
    pub estimation: EstimationMode,

    /// Skip training and only validate existing results
    #[arg(long, default_value_t = false)]
    pub eval_only: bool,

    #[arg(long, default_value_t = 7)]
    pub ngen: usize,

    #[arg(long, default_value_t = 7)]
    pub pops: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: CampaignArgs, engine: EngineSettings) -> SynResult<()> {
    let data = DataSource::new(&args.data_root, &args.dataset, "", &args.fcode);
    let mut study = Study::new(data, &args.save_root);
    study.mode = args.estimation;
    study.seed = args.seed;

    let search = SearchParams {
        ngen: args.ngen,
        pops: args.pops,
        seed: args.seed,
        ..SearchParams::default()
    };
    let options = GeneticOptions::from(&search);
    let factory = ProcessEngineFactory::new(engine);
    let progress = reports::ConsoleProgress::new(options.ngen);

    let results = folds::run_campaign(
        &factory,
        &study,
        &args.entries,
        &options,
        args.eval_only,
        &progress,
    )?;

    reports::print_campaign(&results);
    Ok(())
}
