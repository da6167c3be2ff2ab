//! CLI module
//!
//! Provides:
//! - Argument parsing (`spectrum [options] <command>`)
//! - Logging initialisation
//! - Command dispatch over the feed store accessor

pub mod args;
pub mod dispatch;
pub mod logging;

// Re-exports
pub use args::{Args, Command};
pub use dispatch::{execute, render, run_cli_mode, ExitCode};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] spectrum_databases::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DB_ERROR: i32 = 2;
pub const EXIT_CONFIG_ERROR: i32 = 3;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
