//! Subcommand implementations

pub mod cleanup;
pub mod cursor;
pub mod failures;
pub mod migrate;
pub mod stats;

use orgsync_db::DbPool;
use orgsync_engine::EngineConfig;

use crate::error::CliResult;

/// Load configuration and open the database.
pub(crate) async fn connect() -> CliResult<(EngineConfig, DbPool)> {
    let config = EngineConfig::from_env()?;
    let pool = DbPool::connect(&config.database_url).await?;
    Ok((config, pool))
}
