mod commands;
mod render;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ade-ga-sync", version)]
#[command(about = "Mirror an ADE timetable into a Google Calendar")]
struct Cli {
    /// Path to ade-ga-sync.yml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show every planned operation and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the plan or report as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the timetable to the calendar
    Sync {
        /// Sync events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Sync events until this date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only show what would change
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what a sync would change, without applying it
    Status {
        /// Compare events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Compare events until this date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = commands::Output {
        verbose: cli.verbose,
        json: cli.json,
    };

    match cli.command {
        Commands::Sync { from, to, dry_run } => {
            let setup =
                commands::Setup::load(cli.config.as_deref(), from.as_deref(), to.as_deref())?;
            if dry_run {
                commands::status::run(setup, output).await
            } else {
                commands::sync::run(setup, output).await
            }
        }
        Commands::Status { from, to } => {
            let setup =
                commands::Setup::load(cli.config.as_deref(), from.as_deref(), to.as_deref())?;
            commands::status::run(setup, output).await
        }
    }
}

/// Logs go to stderr so stdout only carries the report.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ade_ga_sync=debug,ade_sync_core=debug,ade_sync_google=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
