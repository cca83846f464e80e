pub mod best;
pub mod bounds;
pub mod campaign;
pub mod export;
pub mod online;
pub mod online_eval;
pub mod queue;
pub mod relabel;
pub mod rtec;
pub mod sweep;
pub mod train;
pub mod validate;

use clap::Args;
use std::path::PathBuf;
use synopt::config::DataSource;
use synopt::evaluation::EstimationMode;
use synopt::workflows::Study;

/// Dataset selection plus where results live.
#[derive(Args, Debug, Clone)]
pub struct StudyArgs {
    #[command(flatten)]
    pub data: DataSource,

    /// Directory holding saved results (defaults depend on the command)
    #[arg(long)]
    pub save_root: Option<PathBuf>,

    /// How expected positions are derived from the reduced trajectory
    #[arg(long, default_value = "interpolate")]
    pub estimation: EstimationMode,
}

impl StudyArgs {
    pub fn study(&self, default_root: &str, seed: Option<u64>) -> Study {
        let root = self
            .save_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_root));
        let mut study = Study::new(self.data.clone(), root);
        study.mode = self.estimation;
        study.seed = seed;
        study
    }
}
