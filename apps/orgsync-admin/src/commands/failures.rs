//! Failures command - Most recent failed operations, newest first

use clap::Args;
use orgsync_core::EntityKind;
use orgsync_db::ArchiveEntry;
use orgsync_engine::OperationQueue;

use crate::error::{CliError, CliResult};

const MAX_LIMIT: u32 = 1000;

/// Arguments for the failures command
#[derive(Args)]
pub struct FailuresArgs {
    /// Entity kind (orgunit or user)
    #[arg(long)]
    pub kind: EntityKind,

    /// Maximum number of rows to show
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the failures command
pub async fn execute(args: FailuresArgs) -> CliResult<()> {
    validate_limit(args.limit)?;

    let (_, pool) = super::connect().await?;
    let failures = OperationQueue::new(pool.clone())
        .failures(args.kind, args.limit)
        .await?;
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&failures)?);
        return Ok(());
    }

    if failures.is_empty() {
        println!("No failed {} operations.", args.kind);
        return Ok(());
    }
    for entry in &failures {
        println!("{}", render(entry));
    }
    Ok(())
}

fn validate_limit(limit: u32) -> CliResult<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(CliError::Validation(format!(
            "--limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

fn render(entry: &ArchiveEntry) -> String {
    format!(
        "{}  {} {} {} ({}): {}",
        entry.archived_at.format("%Y-%m-%d %H:%M:%S"),
        entry.cvr,
        entry.operation,
        entry.uuid,
        entry.kind,
        entry.error.as_deref().unwrap_or("-"),
    )
}
