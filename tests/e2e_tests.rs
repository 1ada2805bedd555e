//! End-to-end integration tests
//!
//! These tests replay predefined command files through the ledger engine and
//! compare the resulting account report with the expected CSV. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every command through a fresh in-memory engine
//! 3. Writes the account report to a temporary file
//! 4. Compares it with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Withdrawal fees and idempotent retries
//! - Held withdrawals that settle, fail or get cancelled
//! - Pool membership and contributions
//! - Daily limits across local day boundaries
//! - Daily interest accrual and re-runs
//! - Rows the ledger rejects (malformed, unknown, not allowed)

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use savings_ledger::{AppConfig, Replay};
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Replay `tests/fixtures/{fixture_name}/input.csv` and compare with expected.csv
    fn run_test_fixture(fixture_name: &str, config: &AppConfig) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut replay = Replay::new(config).expect("Failed to build replay engine");
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        replay
            .run(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay commands: {}", e));

        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {}\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("withdrawal_fee_idempotent")]
    #[case("held_withdrawal_lifecycle")]
    #[case("pool_contributions")]
    #[case("transfer_limits")]
    #[case("daily_accrual")]
    #[case("rejected_rows")]
    fn test_fixtures(#[case] fixture: &str) {
        run_test_fixture(fixture, &AppConfig::default());
    }

    #[test]
    fn test_configured_fee_changes_the_report() {
        let config = AppConfig::from_yaml("ledger:\n  withdrawal_fee: \"1.00\"\n").unwrap();
        let mut replay = Replay::new(&config).unwrap();
        let mut output = Vec::new();

        replay
            .run(
                Path::new("tests/fixtures/withdrawal_fee_idempotent/input.csv"),
                &mut output,
            )
            .unwrap();

        let report = String::from_utf8(output).unwrap();
        assert!(report.contains("A1,alice,69.0000,0.0000,active"));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let mut replay = Replay::new(&AppConfig::default()).unwrap();
        let mut output = Vec::new();

        let result = replay.run(Path::new("tests/fixtures/nope/input.csv"), &mut output);

        assert!(result.is_err());
        assert!(output.is_empty());
    }
}
