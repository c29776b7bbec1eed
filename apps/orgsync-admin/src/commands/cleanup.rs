//! Cleanup command - Purge old success archive rows

use chrono::Utc;
use clap::Args;
use orgsync_engine::{retention_from_days, OperationQueue, MAX_RETENTION_DAYS};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Arguments for the cleanup command
#[derive(Args)]
pub struct CleanupArgs {
    /// Retention in days; defaults to ORGSYNC_SUCCESS_RETENTION_DAYS
    #[arg(long)]
    pub retention_days: Option<i64>,
}

/// Execute the cleanup command
pub async fn execute(args: CleanupArgs) -> CliResult<()> {
    let requested = args.retention_days.map(parse_retention).transpose()?;
    let (config, pool) = super::connect().await?;
    let retention = requested.unwrap_or(config.success_retention);

    let purged = OperationQueue::new(pool.clone())
        .retention_cleanup(Utc::now(), retention)
        .await?;
    pool.close().await;

    info!(purged, retention_days = retention.num_days(), "Success archive cleaned");
    println!("Purged {purged} success archive rows.");
    Ok(())
}

fn parse_retention(days: i64) -> CliResult<chrono::Duration> {
    retention_from_days(days).ok_or_else(|| {
        CliError::Validation(format!(
            "--retention-days must be between 1 and {MAX_RETENTION_DAYS}, got {days}"
        ))
    })
}
