use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::config::EngineSettings;
use synopt::engine::ProcessEngineFactory;
use synopt::error::SynResult;
use synopt::optimizer::Criterion;
use synopt::workflows::{online, ONLINE_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct OnlineEvalArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long, default_value = "rmse")]
    pub opt: Criterion,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: OnlineEvalArgs, engine: EngineSettings) -> SynResult<()> {
    let study = args.study.study(ONLINE_SAVE_ROOT, None);
    let factory = ProcessEngineFactory::new(engine);
    let rows = online::evaluate_online(&factory, &study, args.opt)?;
    reports::print_online_eval(&rows);
    Ok(())
}
