//! Reset-cursor command - Force a full enumeration on the next sync

use clap::Args;
use orgsync_engine::CursorStore;
use tracing::info;

use crate::error::{CliError, CliResult};

/// Arguments for the reset-cursor command
#[derive(Args)]
pub struct ResetCursorArgs {
    /// Source key of the directory, as configured for the tracker
    #[arg(long)]
    pub source: String,
}

/// Execute the reset-cursor command
pub async fn execute(args: ResetCursorArgs) -> CliResult<()> {
    let source = args.source.trim();
    if source.is_empty() {
        return Err(CliError::Validation("--source must not be empty".into()));
    }

    let (_, pool) = super::connect().await?;
    let removed = CursorStore::new(pool.clone()).reset(source).await?;
    pool.close().await;

    if removed {
        info!(source, "Cursor reset");
        println!("Cursor for '{source}' removed; the next sync enumerates the directory.");
    } else {
        println!("No cursor stored for '{source}'.");
    }
    Ok(())
}
