use clap::Parser;
use std::path::PathBuf;

/// Replay savings ledger commands and report the resulting accounts
#[derive(Parser, Debug)]
#[command(name = "savings-ledger")]
#[command(about = "Replay savings ledger commands and report account balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// YAML configuration file
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "Path to a YAML config file (defaults apply when omitted)"
    )]
    pub config: Option<PathBuf>,
}
