//! Streaming CSV reader over replay commands
//!
//! `CommandReader` deserializes one row at a time and hands conversion to
//! `csv_format`, so memory stays constant regardless of file size.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, unreadable file) are returned from `new()`
//! - A malformed row is yielded as `Err(LedgerError::Parse)` carrying its line
//!   number, and iteration continues with the next row

use crate::io::csv_format::{convert_command_record, CommandRecord, CommandRow};
use crate::types::LedgerError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

#[derive(Debug)]
pub struct CommandReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl CommandReader {
    /// Open a command file
    ///
    /// Fields are trimmed and rows may omit trailing columns they do not use.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::Io {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for CommandReader {
    type Item = Result<CommandRow, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CommandRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;
        let line = Some(self.line_num);

        Some(match next {
            Ok(record) => {
                convert_command_record(record).map_err(|message| LedgerError::Parse { line, message })
            }
            Err(e) => Err(LedgerError::Parse {
                line,
                message: format!("CSV parse error: {}", e),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv_format::LedgerCommand;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,at,owner,account,amount,key,pool,goal,start,end,members,frequency\n";

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes())
            .expect("Failed to write to temp file");
        file.write_all(rows.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_reader_fails_on_missing_file() {
        let result = CommandReader::new(Path::new("nonexistent.csv"));

        assert!(matches!(result, Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_reader_yields_commands_in_order() {
        let file = create_temp_csv(
            "open,,alice,A,,,,,,,,\n\
             deposit,2026-03-01T09:00:00Z,alice,A,100,d-1,,,,,,\n\
             accrue,,,,,,,,2026-03-01,,,\n",
        );

        let rows: Vec<_> = CommandReader::new(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[0].command, LedgerCommand::Open { .. }));
        assert!(rows[1].at.is_some());
        assert!(matches!(
            rows[1].command,
            LedgerCommand::Deposit { key: Some(_), .. }
        ));
        assert!(matches!(
            rows[2].command,
            LedgerCommand::Accrue { date: Some(_) }
        ));
    }

    #[test]
    fn test_reader_accepts_short_rows_and_whitespace() {
        let file = create_temp_csv("  open , , alice , A\n");

        let rows: Vec<_> = CommandReader::new(file.path()).unwrap().collect();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_ok());
    }

    #[test]
    fn test_reader_reports_line_and_continues() {
        let file = create_temp_csv(
            "open,,alice,A,,,,,,,,\n\
             deposit,,alice,A,lots,,,,,,,\n\
             deposit,,alice,A,5,,,,,,,\n",
        );

        let rows: Vec<_> = CommandReader::new(file.path()).unwrap().collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        match &rows[1] {
            Err(LedgerError::Parse { line, message }) => {
                assert_eq!(*line, Some(3));
                assert!(message.contains("Invalid amount"));
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(rows[2].is_ok());
    }
}
