//! Spectrum CLI
//!
//! Reads `credentials.json`, runs one query against the feed store, prints
//! the rows as JSON.

use clap::Parser;
use spectrum::cli::{logging, run_cli_mode, Args, EXIT_FAILURE};

fn main() {
    let args = Args::parse();

    let exit_code = {
        // Guard must outlive dispatch so buffered log lines are flushed.
        let _guard = match logging::init(args.verbose, args.log_json) {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(EXIT_FAILURE);
            }
        };
        run_cli_mode(args)
    };

    std::process::exit(exit_code);
}
