use super::StudyArgs;
use crate::reports;
use clap::Args;
use synopt::error::SynResult;
use synopt::workflows::{sweep, CROSS_SAVE_ROOT};

#[derive(Args, Debug, Clone)]
pub struct BoundsArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// RMSE the winner must stay below
    #[arg(long)]
    pub max_rmse: f64,

    /// Compression ratio in percent the winner must stay below
    #[arg(long)]
    pub max_ratio: f64,
}

pub fn run(args: BoundsArgs) -> SynResult<()> {
    let study = args.study.study(CROSS_SAVE_ROOT, None);
    let (grid, cells) = sweep::bounds_report(&study, args.max_rmse, args.max_ratio)?;
    reports::print_bounds(&grid, &cells);
    Ok(())
}
