//! Migrate command - Apply the embedded schema migrations

use clap::Args;
use orgsync_db::run_migrations;
use tracing::info;

use crate::error::CliResult;

/// Arguments for the migrate command
#[derive(Args)]
pub struct MigrateArgs {}

/// Execute the migrate command
pub async fn execute(_args: MigrateArgs) -> CliResult<()> {
    let (_, pool) = super::connect().await?;
    run_migrations(&pool).await?;
    info!("Migrations applied");
    println!("Database schema is up to date.");
    pool.close().await;
    Ok(())
}
