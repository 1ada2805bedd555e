//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (command conversion, account output)
//! - `command_reader` - Streaming reader over replay commands

pub mod command_reader;
pub mod csv_format;

pub use command_reader::CommandReader;
pub use csv_format::{
    convert_command_record, write_accounts_csv, CommandRecord, CommandRow, LedgerCommand,
};
