//! CLI argument parsing
//!
//! ```text
//! spectrum [options] <command>
//!
//! COMMANDS:
//!   feed-items     Feed items from the last eight weeks
//!   publications   SELECT * FROM feed_fetcher_publication
//!   feeds          SELECT * FROM feed_fetcher_feed
//!   tags           SELECT * FROM feed_fetcher_tag
//!   associations   SELECT * FROM feed_fetcher_association
//!   sql <query>    Run arbitrary SQL
//!   uri            Print the connection URI (password masked)
//! ```

use clap::{Parser, Subcommand};
use spectrum_databases::{CREDENTIALS_FILE, DEFAULT_LIMIT};
use std::path::PathBuf;

/// Parsed CLI arguments
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "spectrum", version, about = "Query the Spectrum feed store")]
pub struct Args {
    /// Credentials file
    #[arg(long, default_value = CREDENTIALS_FILE)]
    pub credentials: PathBuf,

    /// Maximum rows to return (tables default to 100, feed items to all)
    #[arg(long, conflicts_with = "no_limit")]
    pub limit: Option<u64>,

    /// Return every row
    #[arg(long)]
    pub no_limit: bool,

    /// Print rows as column -> value objects
    #[arg(long)]
    pub records: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Feed items from the last eight weeks with non-empty content
    FeedItems,
    /// All publications
    Publications,
    /// All feeds
    Feeds,
    /// All tags
    Tags,
    /// All feed/tag associations
    Associations,
    /// Run a query exactly as written
    Sql { query: String },
    /// Print the connection URI with the password masked
    Uri,
}

impl Args {
    /// Row limit for the selected command
    pub fn effective_limit(&self) -> Option<u64> {
        if self.no_limit {
            return None;
        }
        match (self.limit, &self.command) {
            (Some(limit), _) => Some(limit),
            (None, Command::FeedItems) => None,
            (None, _) => Some(DEFAULT_LIMIT),
        }
    }
}
