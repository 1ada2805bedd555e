//! Daily accrual records written by the float/interest job

use super::ids::{AccountId, OwnerId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Global platform revenue for one calendar day
///
/// Write-once per `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAccrualRecord {
    pub date: NaiveDate,

    /// Sum of eligible balances before that day's interest was credited
    pub total_balance: Decimal,

    /// Platform daily rate: (float rate - user rate) / days in year
    pub rate: Decimal,

    pub amount: Decimal,
    pub cumulative_amount: Decimal,
    pub eligible_accounts: usize,
}

/// Interest credited to one account for one calendar day
///
/// Write-once per `(account_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRecord {
    pub account_id: AccountId,
    pub owner_id: OwnerId,
    pub date: NaiveDate,
    pub balance_snapshot: Decimal,

    /// User daily rate: user rate / days in year
    pub rate: Decimal,

    pub amount: Decimal,

    /// The account's `interest_earned` after this credit
    pub cumulative_amount: Decimal,
}

/// Result of `AccrualJob::run_daily_accrual`
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualSummary {
    pub revenue: DailyAccrualRecord,

    /// Interest records that exist for the date
    pub user_interest_count: usize,

    /// Accounts credited by this particular run (zero on a re-run)
    pub credited_this_run: usize,
}
