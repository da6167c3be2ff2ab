//! CLI command dispatch
//!
//! Loads credentials, runs one accessor operation, and prints the result as
//! JSON on stdout.

use crate::cli::{Args, Command, Error, Result};
use crate::cli::{EXIT_CONFIG_ERROR, EXIT_DB_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use spectrum_databases::{Accessor, ConnectionFactory, FetchOptions, ResultSet};
use std::io::Write;
use tracing::debug;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run the parsed command and return the process exit code
pub fn run_cli_mode(args: Args) -> ExitCode {
    match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let accessor = Accessor::open(&args.credentials)?;

    if args.command == Command::Uri {
        println!("{}", accessor.credentials().redacted_connection_string());
        return Ok(());
    }

    let result = execute(&accessor, &args.command, args.effective_limit())?;
    debug!(rows = result.len(), "Writing result");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", render(&result, args.records)?)?;
    Ok(())
}

/// Run a data command against `accessor`
///
/// `Command::Uri` has no result set and yields an empty one.
pub fn execute<F: ConnectionFactory>(
    accessor: &Accessor<F>,
    command: &Command,
    limit: Option<u64>,
) -> Result<ResultSet> {
    let options = FetchOptions {
        connection: None,
        limit,
    };

    let result = match command {
        Command::FeedItems => accessor.feed_items(options)?,
        Command::Publications => accessor.publications(options)?,
        Command::Feeds => accessor.feeds(options)?,
        Command::Tags => accessor.tags(options)?,
        Command::Associations => accessor.associations(options)?,
        Command::Sql { query } => accessor.run_query(query, None)?,
        Command::Uri => ResultSet::default(),
    };
    Ok(result)
}

/// Pretty JSON: `{"columns": [...], "rows": [...]}`, or an array of
/// column -> value objects when `records` is set
pub fn render(result: &ResultSet, records: bool) -> Result<String> {
    let text = if records {
        serde_json::to_string_pretty(&result.records())?
    } else {
        serde_json::to_string_pretty(result)?
    };
    Ok(text)
}

fn exit_code_for(error: &Error) -> ExitCode {
    match error {
        Error::Database(spectrum_databases::Error::Configuration(_)) => EXIT_CONFIG_ERROR,
        Error::Database(e) if e.is_driver() => EXIT_DB_ERROR,
        _ => EXIT_FAILURE,
    }
}
