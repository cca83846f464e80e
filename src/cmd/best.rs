use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::error::SynResult;
use synopt::optimizer::Criterion;
use synopt::workflows::{folds, CROSS_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct BestArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// First part of the six folds to summarize
    #[arg(long, default_value_t = 1)]
    pub first_part: usize,

    #[arg(long, default_value = "rmse")]
    pub opt: Criterion,
}

pub fn run(args: BestArgs) -> SynResult<()> {
    let study = args.study.study(CROSS_SAVE_ROOT, None);
    let summary = folds::best_of_folds(&study, args.first_part, args.opt)?;
    reports::print_fold_summary(&summary);
    Ok(())
}
