use crate::reports;
use clap::Args;
use std::path::PathBuf;
use synopt::config::EngineSettings;
use synopt::engine::ProcessEngine;
use synopt::error::{SynResult, SynoptError};
use synopt::params::ParameterVector;
use synopt::workflows::export::export_dataset;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Raw trajectory files staged as the engine input
    #[arg(short, long, num_args = 1.., required_unless_present = "dataset", conflicts_with = "dataset")]
    pub input: Vec<PathBuf>,

    /// Parameter vector, e.g. "(4.0, 1800, 5, 3600, 0.5, 50.0, 0.25, 5.0)"
    #[arg(long, conflicts_with = "dataset")]
    pub params: Option<ParameterVector>,

    /// Target for the critical points and gap notifications (JSON lines)
    #[arg(short, long, required_unless_present = "dataset")]
    pub out: Option<PathBuf>,

    /// Target for the noise stream
    #[arg(long, required_unless_present = "dataset")]
    pub noise_out: Option<PathBuf>,

    /// Export every ship type of this dataset with its tuned vector
    #[arg(long)]
    pub dataset: Option<String>,

    /// Root holding one directory per dataset
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Where the per-type synopses files are written
    #[arg(long, default_value = "tmp_RTEC")]
    pub out_dir: PathBuf,

    /// Use the engine defaults for every ship type
    #[arg(long, requires = "dataset")]
    pub use_default: bool,

    #[command(flatten)]
    pub engine: EngineSettings,
}

pub fn run(args: ExportArgs, engine: EngineSettings) -> SynResult<()> {
    if let Some(dataset) = &args.dataset {
        let exports = export_dataset(&engine, &args.data_root, dataset, &args.out_dir, args.use_default)?;
        reports::print_type_exports(&exports);
        info!("📤 Exported {} ship types to {}", exports.len(), args.out_dir.display());
        return Ok(());
    }

    let (out, noise_out) = match (&args.out, &args.noise_out) {
        (Some(o), Some(n)) => (o, n),
        _ => return Err(SynoptError::Config("--out and --noise-out are required".into())),
    };
    let params = args.params.unwrap_or_default();
    reports::print_parameters(&params);

    let mut process = ProcessEngine::start(&engine, &args.input)?;
    let exported = process.run_and_export(&params, out, noise_out);
    let finished = process.finish();
    let output = exported?;
    finished?;

    info!(
        "📤 Exported {} critical, {} notification and {} noise records",
        output.critical.len(),
        output.notifications.len(),
        output.noise.len()
    );
    Ok(())
}
