//! CLI error types and exit codes

use orgsync_db::DbError;
use orgsync_engine::{ConfigError, QueueError, SyncError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Configuration error
/// - 3: Database unreachable
/// - 4: Invalid input
/// - 5: Query or data error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Output(_) => 1,
            CliError::Validation(_) => 4,
            CliError::Database(e) if e.is_connection_error() => 3,
            CliError::Queue(QueueError::Database(e)) if e.is_connection_error() => 3,
            CliError::Database(_) | CliError::Queue(_) | CliError::Sync(_) => 5,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::MissingVar(_)) => {
                Some("Set the variable in the environment or in a .env file.")
            }
            CliError::Database(e) if e.is_query_error() => {
                Some("Run 'orgsync-admin migrate' to bring the schema up to date.")
            }
            _ => None,
        }
    }
}
