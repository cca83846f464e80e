use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use synopt::config::EngineSettings;
use synopt::error::SynResult;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Genetic tuning of trajectory synopses parameters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with engine settings; flags typed on the command line win
    #[arg(global = true, long)]
    engine_config: Option<PathBuf>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on five parts of a six-part block
    Train(cmd::train::TrainArgs),
    /// Evaluate the training winner on its held-out part
    Validate(cmd::validate::ValidateArgs),
    /// Train and validate a list of Part@Opt@Type entries
    Campaign(cmd::campaign::CampaignArgs),
    /// Summarize the winners of six folds
    Best(cmd::best::BestArgs),
    /// Check which sweep criteria pick a winner inside RMSE and ratio bounds
    Bounds(cmd::bounds::BoundsArgs),
    /// Train segment by segment, carrying the best vectors forward
    Online(cmd::online::OnlineArgs),
    /// Evaluate each online segment's winner on the following segment
    OnlineEval(cmd::online_eval::OnlineEvalArgs),
    /// Run the search for every cell of the criterion grid
    Sweep(cmd::sweep::SweepArgs),
    /// Run the engine once, or once per ship type of a dataset, and keep its output
    Export(cmd::export::ExportArgs),
    /// Recompute event annotations of exported records
    Relabel(cmd::relabel::RelabelArgs),
    /// Build event recognition input from per-type exports
    Rtec(cmd::rtec::RtecArgs),
    /// Run queued shell commands one at a time
    Queue(cmd::queue::QueueArgs),
}

/// Engine settings from `--engine-config` with explicit CLI flags merged on top.
fn resolve_engine(
    flags: &EngineSettings,
    file: Option<&Path>,
    matches: &ArgMatches,
) -> SynResult<EngineSettings> {
    match file {
        Some(path) => {
            info!("⚙️  Loading engine settings from {}", path.display());
            let mut settings = EngineSettings::load_from_file(path)?;
            settings.merge_from_cli(flags, matches);
            Ok(settings)
        }
        None => Ok(flags.clone()),
    }
}

fn main() {
    // Raw matches tell user input apart from clap defaults.
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    // Engine flags live in the subcommand's matches, not the root.
    let sub_matches = matches.subcommand().map(|(_, m)| m).unwrap_or(&matches);
    let engine_config = cli.engine_config.clone();
    let engine = |flags: &EngineSettings| resolve_engine(flags, engine_config.as_deref(), sub_matches);

    let result = match cli.command {
        Commands::Train(args) => engine(&args.engine).and_then(|e| cmd::train::run(args, e)),
        Commands::Validate(args) => engine(&args.engine).and_then(|e| cmd::validate::run(args, e)),
        Commands::Campaign(args) => engine(&args.engine).and_then(|e| cmd::campaign::run(args, e)),
        Commands::Best(args) => cmd::best::run(args),
        Commands::Bounds(args) => cmd::bounds::run(args),
        Commands::Online(args) => engine(&args.engine).and_then(|e| cmd::online::run(args, e)),
        Commands::OnlineEval(args) => {
            engine(&args.engine).and_then(|e| cmd::online_eval::run(args, e))
        }
        Commands::Sweep(args) => engine(&args.engine).and_then(|e| cmd::sweep::run(args, e)),
        Commands::Export(args) => engine(&args.engine).and_then(|e| cmd::export::run(args, e)),
        Commands::Relabel(args) => cmd::relabel::run(args),
        Commands::Rtec(args) => cmd::rtec::run(args),
        Commands::Queue(args) => cmd::queue::run(args),
    };

    if let Err(e) = result {
        error!("❌ {}", e);
        process::exit(1);
    }
}
