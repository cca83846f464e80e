use clap::Args;
use std::path::PathBuf;
use synopt::engine::rtec::{merge_spatial, merged_path, prepare};
use synopt::error::SynResult;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct RtecArgs {
    /// Dataset whose per-type exports are prepared
    pub dataset: String,

    /// Directory holding the `synopses_*` exports; outputs land here too
    #[arg(long, default_value = "tmp_RTEC")]
    pub dir: PathBuf,

    /// Root holding one directory per dataset
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Raw AIS feed with true headings (defaults to `{data_root}/{dataset}/nari_dynamic.csv`)
    #[arg(long)]
    pub raw_feed: Option<PathBuf>,

    /// Spatial events to interleave into the pipe-separated rows
    #[arg(long)]
    pub spatial_events: Option<PathBuf>,
}

pub fn run(args: RtecArgs) -> SynResult<()> {
    let feed = args
        .raw_feed
        .clone()
        .unwrap_or_else(|| args.data_root.join(&args.dataset).join("nari_dynamic.csv"));
    let feed = if feed.exists() {
        Some(feed)
    } else {
        warn!("No raw feed at {}; true headings stay at 0", feed.display());
        None
    };

    let written = prepare(&args.dir, &args.dataset, feed.as_deref())?;
    for files in &written {
        info!(
            "📝 {} {} positions -> {}, {}",
            files.fixes,
            files.variant,
            files.spatial.display(),
            files.rows.display()
        );

        if let Some(events) = &args.spatial_events {
            let target = merged_path(&args.dir, &args.dataset, files.variant);
            let count = merge_spatial(&files.rows, events, &target)?;
            info!("🗺️  Interleaved {} spatial events into {}", count, target.display());
        }
    }
    Ok(())
}
