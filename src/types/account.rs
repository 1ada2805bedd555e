//! Account-related types for the savings ledger
//!
//! This module defines the Account structure and related functionality
//! for managing a user's internal cash balance.

use super::ids::{AccountId, OwnerId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an account may still be debited or credited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a balance is being adjusted
///
/// Recorded in logs for every adjustment. `Interest` additionally
/// increments the account's cumulative `interest_earned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceReason {
    Deposit,
    Withdrawal,
    Fee,
    PoolContribution,
    Reversal,
    Interest,
}

impl BalanceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceReason::Deposit => "deposit",
            BalanceReason::Withdrawal => "withdrawal",
            BalanceReason::Fee => "fee",
            BalanceReason::PoolContribution => "pool_contribution",
            BalanceReason::Reversal => "reversal",
            BalanceReason::Interest => "interest",
        }
    }
}

impl fmt::Display for BalanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's internal cash account
///
/// One per user, created at onboarding. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque, unique account identifier
    pub account_id: AccountId,

    /// The user that owns this account
    pub owner_id: OwnerId,

    /// Spendable balance; never negative
    pub balance: Decimal,

    /// Cumulative interest credited by the accrual job
    pub interest_earned: Decimal,

    pub status: AccountStatus,

    /// Last calendar day interest was credited for
    pub last_interest_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with zero balances
    pub fn new(account_id: AccountId, owner_id: OwnerId, created_at: DateTime<Utc>) -> Self {
        Account {
            account_id,
            owner_id,
            balance: Decimal::ZERO,
            interest_earned: Decimal::ZERO,
            status: AccountStatus::Active,
            last_interest_date: None,
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
