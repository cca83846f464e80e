use clap::Args;
use std::path::PathBuf;
use synopt::engine::relabel::{relabel_file, RelabelThresholds};
use synopt::error::SynResult;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct RelabelArgs {
    /// Exported record files, rewritten in place
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub thresholds: RelabelThresholds,
}

pub fn run(args: RelabelArgs) -> SynResult<()> {
    for file in &args.files {
        let count = relabel_file(file, &args.thresholds)?;
        info!("🏷️  Relabelled {} records in {}", count, file.display());
    }
    Ok(())
}
