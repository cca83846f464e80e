use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::config::EngineSettings;
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::optimizer::Criterion;
use synopt::workflows::{folds, CROSS_SAVE_ROOT};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(short, long)]
    pub part: usize,

    #[arg(long, default_value = "rmse")]
    pub opt: Criterion,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: ValidateArgs, engine: EngineSettings) -> SynResult<()> {
    let study = args.study.study(CROSS_SAVE_ROOT, None);
    let factory = ProcessEngineFactory::new(engine);

    match folds::validate(&factory, &study, args.part, args.opt)? {
        Some(rows) => reports::print_validation(args.part, &rows),
        None => info!("Part {} has not been trained yet", args.part),
    }
    Ok(())
}
