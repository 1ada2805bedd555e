//! Error types for the savings ledger
//!
//! This module defines all error types that can occur in the ledger core.
//!
//! # Error Categories
//!
//! - **Validation Errors**: malformed input, non-positive amounts, bad date ranges.
//!   Rejected before any mutation.
//! - **Business Rule Rejections**: insufficient funds, limits, pool rules, transfer
//!   lifecycle violations. Reported with no partial state change.
//! - **Conflicts**: contention the core refuses to resolve itself; callers retry.
//! - **Infrastructure Errors**: storage, configuration and replay I/O failures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Rejected,
    Conflict,
    Infrastructure,
}

/// Main error type for the ledger core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Why it was rejected
        reason: String,
    },

    /// Pool date range is empty, inverted or in the past
    #[error("Invalid date range {start}..{end}: {reason}")]
    InvalidDateRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    /// Any other malformed input
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Debit would take the balance below zero
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: Decimal,
        requested: Decimal,
    },

    /// Calendar-day transfer ceiling would be breached
    #[error("Daily limit exceeded for {owner}: used {used}, requested {requested}, limit {limit}")]
    DailyLimitExceeded {
        owner: String,
        used: Decimal,
        requested: Decimal,
        limit: Decimal,
    },

    /// Calendar-month transfer ceiling would be breached
    #[error(
        "Monthly limit exceeded for {owner}: used {used}, requested {requested}, limit {limit}"
    )]
    MonthlyLimitExceeded {
        owner: String,
        used: Decimal,
        requested: Decimal,
        limit: Decimal,
    },

    #[error("Account {account} not found")]
    AccountNotFound { account: String },

    #[error("Account {account} is inactive")]
    AccountInactive { account: String },

    #[error("Account {account} already exists")]
    DuplicateAccount { account: String },

    /// The caller tried to move money in an account it does not own
    #[error("Account {account} does not belong to {owner}")]
    AccountOwnerMismatch { account: String, owner: String },

    #[error("Transfer {transfer} not found")]
    TransferNotFound { transfer: String },

    /// Cancel attempted outside `pending`
    #[error("Transfer {transfer} cannot be cancelled in status {status}")]
    TransferNotCancellable { transfer: String, status: String },

    /// Lifecycle transition attempted from the wrong status
    #[error("Transfer {transfer} cannot {operation} in status {status}")]
    InvalidTransferState {
        transfer: String,
        status: String,
        operation: String,
    },

    #[error("Pool {pool} not found")]
    PoolNotFound { pool: String },

    #[error("Pool {pool} is {status}")]
    PoolInactive { pool: String, status: String },

    #[error("Pool {pool} is full ({max_members} members)")]
    PoolFull { pool: String, max_members: u32 },

    #[error("Pool {pool} already started on {start_date}")]
    PoolAlreadyStarted { pool: String, start_date: NaiveDate },

    #[error("{user} is already a member of pool {pool}")]
    AlreadyMember { pool: String, user: String },

    #[error("{user} is not a member of pool {pool}")]
    NotAMember { pool: String, user: String },

    #[error("{user} created pool {pool} and cannot leave it")]
    CreatorCannotLeave { pool: String, user: String },

    #[error("{user} is not the creator of pool {pool}")]
    NotPoolCreator { pool: String, user: String },

    /// Checked decimal arithmetic failed
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// Contention the locking strategy will not resolve; retry
    #[error("Concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },

    /// Store failure (lock poisoning, broken invariants in the backing store)
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    /// Replay input could not be parsed
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_date_range(start: NaiveDate, end: NaiveDate, reason: &str) -> Self {
        LedgerError::InvalidDateRange {
            start,
            end,
            reason: reason.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn insufficient_funds(
        account: impl ToString,
        balance: Decimal,
        requested: Decimal,
    ) -> Self {
        LedgerError::InsufficientFunds {
            account: account.to_string(),
            balance,
            requested,
        }
    }

    pub fn daily_limit_exceeded(
        owner: impl ToString,
        used: Decimal,
        requested: Decimal,
        limit: Decimal,
    ) -> Self {
        LedgerError::DailyLimitExceeded {
            owner: owner.to_string(),
            used,
            requested,
            limit,
        }
    }

    pub fn monthly_limit_exceeded(
        owner: impl ToString,
        used: Decimal,
        requested: Decimal,
        limit: Decimal,
    ) -> Self {
        LedgerError::MonthlyLimitExceeded {
            owner: owner.to_string(),
            used,
            requested,
            limit,
        }
    }

    pub fn account_not_found(account: impl ToString) -> Self {
        LedgerError::AccountNotFound {
            account: account.to_string(),
        }
    }

    pub fn account_inactive(account: impl ToString) -> Self {
        LedgerError::AccountInactive {
            account: account.to_string(),
        }
    }

    pub fn duplicate_account(account: impl ToString) -> Self {
        LedgerError::DuplicateAccount {
            account: account.to_string(),
        }
    }

    pub fn account_owner_mismatch(account: impl ToString, owner: impl ToString) -> Self {
        LedgerError::AccountOwnerMismatch {
            account: account.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn transfer_not_found(transfer: impl ToString) -> Self {
        LedgerError::TransferNotFound {
            transfer: transfer.to_string(),
        }
    }

    pub fn transfer_not_cancellable(transfer: impl ToString, status: impl ToString) -> Self {
        LedgerError::TransferNotCancellable {
            transfer: transfer.to_string(),
            status: status.to_string(),
        }
    }

    pub fn invalid_transfer_state(
        transfer: impl ToString,
        status: impl ToString,
        operation: &str,
    ) -> Self {
        LedgerError::InvalidTransferState {
            transfer: transfer.to_string(),
            status: status.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn pool_not_found(pool: impl ToString) -> Self {
        LedgerError::PoolNotFound {
            pool: pool.to_string(),
        }
    }

    pub fn pool_inactive(pool: impl ToString, status: impl ToString) -> Self {
        LedgerError::PoolInactive {
            pool: pool.to_string(),
            status: status.to_string(),
        }
    }

    pub fn pool_full(pool: impl ToString, max_members: u32) -> Self {
        LedgerError::PoolFull {
            pool: pool.to_string(),
            max_members,
        }
    }

    pub fn pool_already_started(pool: impl ToString, start_date: NaiveDate) -> Self {
        LedgerError::PoolAlreadyStarted {
            pool: pool.to_string(),
            start_date,
        }
    }

    pub fn already_member(pool: impl ToString, user: impl ToString) -> Self {
        LedgerError::AlreadyMember {
            pool: pool.to_string(),
            user: user.to_string(),
        }
    }

    pub fn not_a_member(pool: impl ToString, user: impl ToString) -> Self {
        LedgerError::NotAMember {
            pool: pool.to_string(),
            user: user.to_string(),
        }
    }

    pub fn creator_cannot_leave(pool: impl ToString, user: impl ToString) -> Self {
        LedgerError::CreatorCannotLeave {
            pool: pool.to_string(),
            user: user.to_string(),
        }
    }

    pub fn not_pool_creator(pool: impl ToString, user: impl ToString) -> Self {
        LedgerError::NotPoolCreator {
            pool: pool.to_string(),
            user: user.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn concurrency_conflict(message: impl Into<String>) -> Self {
        LedgerError::ConcurrencyConflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }

    /// Classify the error for callers deciding whether to retry
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidDateRange { .. }
            | LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            LedgerError::Storage { .. }
            | LedgerError::Config { .. }
            | LedgerError::Io { .. }
            | LedgerError::Parse { .. } => ErrorKind::Infrastructure,
            _ => ErrorKind::Rejected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Infrastructure)
    }
}
