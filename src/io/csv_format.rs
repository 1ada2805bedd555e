//! CSV format handling for replay commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input Columns
//!
//! `op,at,owner,account,amount,key,pool,goal,start,end,members,frequency`
//!
//! Only `op` is always required. `pool` is a label local to the replay file
//! (pool ids are generated by the engine), and `key` doubles as the label
//! `settle`, `fail` and `cancel` use to find a held transfer.

use crate::types::{Account, AccountId, Frequency, LedgerError, OwnerId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CommandRecord {
    pub op: String,
    pub at: Option<String>,
    pub owner: Option<String>,
    pub account: Option<String>,
    pub amount: Option<String>,
    pub key: Option<String>,
    pub pool: Option<String>,
    pub goal: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub members: Option<String>,
    pub frequency: Option<String>,
}

/// One replayable ledger operation
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    Open {
        owner: OwnerId,
        account: AccountId,
    },
    Deactivate {
        account: AccountId,
    },
    Deposit {
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        key: Option<String>,
    },
    Withdraw {
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        key: Option<String>,
    },
    /// Withdrawal left pending until `settle`, `fail` or `cancel`
    HoldWithdrawal {
        owner: OwnerId,
        account: AccountId,
        amount: Decimal,
        key: String,
    },
    Settle {
        owner: OwnerId,
        key: String,
    },
    Fail {
        owner: OwnerId,
        key: String,
    },
    Cancel {
        owner: OwnerId,
        key: String,
    },
    CreatePool {
        owner: OwnerId,
        pool: String,
        goal: Decimal,
        contribution: Decimal,
        start: NaiveDate,
        end: NaiveDate,
        members: u32,
        frequency: Frequency,
    },
    JoinPool {
        owner: OwnerId,
        pool: String,
        contribution: Decimal,
    },
    Contribute {
        owner: OwnerId,
        pool: String,
        account: AccountId,
        amount: Decimal,
        key: Option<String>,
    },
    LeavePool {
        owner: OwnerId,
        pool: String,
    },
    CancelPool {
        owner: OwnerId,
        pool: String,
    },
    /// Run the accrual for `date`, or for the ledger's current date
    Accrue {
        date: Option<NaiveDate>,
    },
}

/// A command and the instant it happens at
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRow {
    pub at: Option<DateTime<Utc>>,
    pub command: LedgerCommand,
}

fn field<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &str, op: &str) -> Result<&'a str, String> {
    field(value).ok_or_else(|| format!("'{}' is missing '{}'", op, name))
}

fn parse_decimal(value: &str, name: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|_| format!("Invalid {} '{}'", name, value))
}

fn parse_date(value: &str, name: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid {} date '{}'", name, value))
}

/// Convert a CommandRecord to a CommandRow
///
/// Operation names are case-insensitive. Columns an operation does not use
/// are ignored.
pub fn convert_command_record(record: CommandRecord) -> Result<CommandRow, String> {
    let op = record.op.trim().to_lowercase();

    let at = match field(&record.at) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| format!("Invalid timestamp '{}'", raw))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let owner = || required(&record.owner, "owner", &op).map(OwnerId::from);
    let account = || required(&record.account, "account", &op).map(AccountId::from);
    let amount = || parse_decimal(required(&record.amount, "amount", &op)?, "amount");
    let key = || field(&record.key).map(str::to_string);
    let label = || required(&record.key, "key", &op).map(str::to_string);
    let pool = || required(&record.pool, "pool", &op).map(str::to_string);

    let command = match op.as_str() {
        "open" => LedgerCommand::Open {
            owner: owner()?,
            account: account()?,
        },
        "deactivate" => LedgerCommand::Deactivate {
            account: account()?,
        },
        "deposit" => LedgerCommand::Deposit {
            owner: owner()?,
            account: account()?,
            amount: amount()?,
            key: key(),
        },
        "withdraw" => LedgerCommand::Withdraw {
            owner: owner()?,
            account: account()?,
            amount: amount()?,
            key: key(),
        },
        "hold_withdrawal" => LedgerCommand::HoldWithdrawal {
            owner: owner()?,
            account: account()?,
            amount: amount()?,
            key: label()?,
        },
        "settle" => LedgerCommand::Settle {
            owner: owner()?,
            key: label()?,
        },
        "fail" => LedgerCommand::Fail {
            owner: owner()?,
            key: label()?,
        },
        "cancel" => LedgerCommand::Cancel {
            owner: owner()?,
            key: label()?,
        },
        "create_pool" => {
            let members = required(&record.members, "members", &op)?;
            let frequency = required(&record.frequency, "frequency", &op)?;
            LedgerCommand::CreatePool {
                owner: owner()?,
                pool: pool()?,
                goal: parse_decimal(required(&record.goal, "goal", &op)?, "goal")?,
                contribution: amount()?,
                start: parse_date(required(&record.start, "start", &op)?, "start")?,
                end: parse_date(required(&record.end, "end", &op)?, "end")?,
                members: members
                    .parse()
                    .map_err(|_| format!("Invalid members '{}'", members))?,
                frequency: Frequency::from_str(frequency)?,
            }
        }
        "join_pool" => LedgerCommand::JoinPool {
            owner: owner()?,
            pool: pool()?,
            contribution: amount()?,
        },
        "contribute" => LedgerCommand::Contribute {
            owner: owner()?,
            pool: pool()?,
            account: account()?,
            amount: amount()?,
            key: key(),
        },
        "leave_pool" => LedgerCommand::LeavePool {
            owner: owner()?,
            pool: pool()?,
        },
        "cancel_pool" => LedgerCommand::CancelPool {
            owner: owner()?,
            pool: pool()?,
        },
        "accrue" => LedgerCommand::Accrue {
            date: field(&record.start)
                .map(|raw| parse_date(raw, "accrual"))
                .transpose()?,
        },
        _ => return Err(format!("Invalid operation: '{}'", record.op)),
    };

    Ok(CommandRow { at, command })
}

/// Write account states to CSV format
///
/// Writes accounts with columns: account, owner, balance, interest_earned,
/// status. Accounts are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "owner", "balance", "interest_earned", "status"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    for account in sorted_accounts {
        writer.write_record(&[
            account.account_id.to_string(),
            account.owner_id.to_string(),
            format!("{:.4}", account.balance),
            format!("{:.4}", account.interest_earned),
            account.status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountStatus;
    use chrono::TimeZone;
    use rstest::rstest;

    fn record(op: &str) -> CommandRecord {
        CommandRecord {
            op: op.to_string(),
            ..CommandRecord::default()
        }
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[rstest]
    #[case::lowercase("deposit")]
    #[case::uppercase("DEPOSIT")]
    #[case::padded("  Deposit ")]
    fn test_convert_deposit(#[case] op: &str) {
        let row = convert_command_record(CommandRecord {
            owner: some("alice"),
            account: some("A"),
            amount: some(" 100.50 "),
            ..record(op)
        })
        .unwrap();

        assert_eq!(row.at, None);
        assert_eq!(
            row.command,
            LedgerCommand::Deposit {
                owner: OwnerId::from("alice"),
                account: AccountId::from("A"),
                amount: Decimal::new(10050, 2),
                key: None,
            }
        );
    }

    #[test]
    fn test_convert_parses_timestamp() {
        let row = convert_command_record(CommandRecord {
            at: some("2026-03-10T23:30:00-05:00"),
            ..record("accrue")
        })
        .unwrap();

        assert_eq!(
            row.at,
            Some(Utc.with_ymd_and_hms(2026, 3, 11, 4, 30, 0).unwrap())
        );
        assert_eq!(row.command, LedgerCommand::Accrue { date: None });
    }

    #[test]
    fn test_convert_create_pool() {
        let row = convert_command_record(CommandRecord {
            owner: some("alice"),
            pool: some("trip"),
            amount: some("50"),
            goal: some("300"),
            start: some("2026-04-01"),
            end: some("2026-06-01"),
            members: some("4"),
            frequency: some("weekly"),
            ..record("create_pool")
        })
        .unwrap();

        match row.command {
            LedgerCommand::CreatePool {
                goal,
                contribution,
                members,
                frequency,
                start,
                ..
            } => {
                assert_eq!(goal, Decimal::new(300, 0));
                assert_eq!(contribution, Decimal::new(50, 0));
                assert_eq!(members, 4);
                assert_eq!(frequency, Frequency::Weekly);
                assert_eq!(start, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
            }
            other => panic!("Expected CreatePool, got {:?}", other),
        }
    }

    #[rstest]
    #[case::unknown_op(record("transfer"), "Invalid operation")]
    #[case::missing_owner(CommandRecord { account: some("A"), amount: some("1"), ..record("deposit") }, "is missing 'owner'")]
    #[case::missing_amount(CommandRecord { owner: some("a"), account: some("A"), ..record("withdraw") }, "is missing 'amount'")]
    #[case::blank_amount(CommandRecord { owner: some("a"), account: some("A"), amount: some("  "), ..record("deposit") }, "is missing 'amount'")]
    #[case::bad_amount(CommandRecord { owner: some("a"), account: some("A"), amount: some("ten"), ..record("deposit") }, "Invalid amount")]
    #[case::hold_without_key(CommandRecord { owner: some("a"), account: some("A"), amount: some("1"), ..record("hold_withdrawal") }, "is missing 'key'")]
    #[case::bad_timestamp(CommandRecord { at: some("yesterday"), ..record("accrue") }, "Invalid timestamp")]
    #[case::bad_date(CommandRecord { start: some("2026-13-01"), ..record("accrue") }, "Invalid accrual date")]
    fn test_convert_errors(#[case] input: CommandRecord, #[case] expected_error: &str) {
        let result = convert_command_record(input);

        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.contains(expected_error), "unexpected error: {}", error);
    }

    fn account(id: &str, owner: &str, balance: Decimal, interest: Decimal, active: bool) -> Account {
        let mut account = Account::new(
            AccountId::from(id),
            OwnerId::from(owner),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        account.balance = balance;
        account.interest_earned = interest;
        if !active {
            account.status = AccountStatus::Inactive;
        }
        account
    }

    #[rstest]
    #[case::empty_accounts(vec![], "account,owner,balance,interest_earned,status\n")]
    #[case::four_decimal_precision(
        vec![account("A", "alice", Decimal::new(6975, 2), Decimal::ZERO, true)],
        "account,owner,balance,interest_earned,status\nA,alice,69.7500,0.0000,active\n"
    )]
    #[case::sorted_by_account_id(
        vec![
            account("b", "bob", Decimal::ZERO, Decimal::ZERO, false),
            account("a", "alice", Decimal::new(10001096, 4), Decimal::new(1096, 4), true),
        ],
        "account,owner,balance,interest_earned,status\na,alice,1000.1096,0.1096,active\nb,bob,0.0000,0.0000,inactive\n"
    )]
    fn test_write_accounts_csv(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }
}
