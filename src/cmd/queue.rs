use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use synopt::error::SynResult;
use synopt::queue::{drain, DEFAULT_QUEUE_FILE};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// File with one shell command per line
    #[arg(default_value = DEFAULT_QUEUE_FILE)]
    pub file: PathBuf,

    /// Seconds to wait after each command
    #[arg(long, default_value_t = 3)]
    pub pause_secs: u64,
}

pub fn run(args: QueueArgs) -> SynResult<()> {
    let run = drain(&args.file, Duration::from_secs(args.pause_secs))?;
    info!(
        "🏁 Queue {} drained: {} commands, {} failed",
        args.file.display(),
        run.executed,
        run.failed
    );
    Ok(())
}
