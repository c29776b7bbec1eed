//! orgsync admin - operator tooling for the sync queue
//!
//! Runs against the same database as the sync service:
//! - Apply schema migrations
//! - Show queue depth and archive counts
//! - List recent failures
//! - Reset a directory cursor to force a full enumeration
//! - Purge old success archive rows

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use error::CliResult;

/// orgsync admin - queue and cursor maintenance
#[derive(Parser)]
#[command(name = "orgsync-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate(commands::migrate::MigrateArgs),

    /// Show pending and archived counts per kind
    Stats(commands::stats::StatsArgs),

    /// List the most recent failed operations
    Failures(commands::failures::FailuresArgs),

    /// Forget a directory cursor so the next sync enumerates everything
    ResetCursor(commands::cursor::ResetCursorArgs),

    /// Purge success archive rows past the retention window
    Cleanup(commands::cleanup::CleanupArgs),
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orgsync_engine=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args).await,
        Commands::Stats(args) => commands::stats::execute(args).await,
        Commands::Failures(args) => commands::failures::execute(args).await,
        Commands::ResetCursor(args) => commands::cursor::execute(args).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args).await,
    }
}
