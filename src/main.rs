//! Savings ledger CLI
//!
//! Replays a CSV file of ledger commands and prints the final account states.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --config config/default.yaml commands.csv > accounts.csv
//! RUST_LOG=debug cargo run -- commands.csv > accounts.csv
//! ```
//!
//! Logs go to stderr. Rows the ledger rejects are logged and skipped.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid config, input file not found or not readable, etc.)

use savings_ledger::cli;
use savings_ledger::config::AppConfig;
use savings_ledger::logging::init_logging;
use savings_ledger::replay::Replay;
use savings_ledger::LedgerError;
use std::process;
use tracing::error;

fn run(args: &cli::CliArgs) -> Result<(), LedgerError> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config.logging);

    let mut replay = Replay::new(&config)?;
    let mut output = std::io::stdout();
    replay.run(&args.input_file, &mut output)
}

fn main() {
    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        error!(error = %e, "replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
