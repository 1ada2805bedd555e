//! Transfer-related types for the savings ledger
//!
//! This module defines transfer types, statuses, the stored transfer row and
//! the request/query shapes used by the transfer ledger.

use super::error::LedgerError;
use super::ids::{AccountId, OwnerId, PoolId, TransferId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of money movement the ledger records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    /// Credit an internal account from an external source
    ///
    /// The `from` endpoint is an opaque bank-link token; only `to` is touched.
    Deposit,

    /// Debit an internal account towards an external destination
    ///
    /// The flat processing fee is charged on top of the amount.
    Withdrawal,

    /// Move funds from an internal account into a savings pool
    ///
    /// Increments the pool's `current_amount` and the member's
    /// `total_contributed` in the same transaction as the debit.
    PoolContribution,

    /// Pay out of a pool into a member account
    ///
    /// Recorded type only: the ledger rejects new distributions until a
    /// payout policy exists.
    PoolDistribution,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Deposit => "deposit",
            TransferType::Withdrawal => "withdrawal",
            TransferType::PoolContribution => "pool_contribution",
            TransferType::PoolDistribution => "pool_distribution",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer lifecycle status
///
/// ```text
/// pending ──> processing ──> completed
///    │             └───────> failed
///    ├──────────────────────> completed | failed
///    └──────────────────────> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Processing => "processing",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this transfer still counts against the owner's limits
    pub fn counts_toward_limits(&self) -> bool {
        matches!(
            self,
            TransferStatus::Pending | TransferStatus::Processing | TransferStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded money movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(with = "transfer_id_serde")]
    pub id: TransferId,

    /// Caller-supplied retry token, unique per owner
    pub idempotency_key: Option<String>,

    pub owner_id: OwnerId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,

    /// Processing fee charged on top of `amount` (withdrawals only)
    pub fee: Decimal,

    pub transfer_type: TransferType,
    pub pool_id: Option<PoolId>,
    pub status: TransferStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// The total leaving the debited internal account
    pub fn debit_total(&self) -> Result<Decimal, LedgerError> {
        self.amount
            .checked_add(self.fee)
            .ok_or_else(|| LedgerError::arithmetic_overflow("transfer amount plus fee"))
    }

    /// Whether a request carries the same arguments as this stored transfer
    pub fn matches_request(&self, request: &TransferRequest) -> bool {
        self.owner_id == request.owner_id
            && self.from == request.from
            && self.to == request.to
            && self.amount == request.amount
            && self.transfer_type == request.transfer_type
            && self.pool_id == request.pool_id
    }
}

mod transfer_id_serde {
    use super::TransferId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &TransferId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TransferId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Input to `TransferLedger::create_transfer` / `submit_transfer`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub owner_id: OwnerId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub transfer_type: TransferType,
    pub pool_id: Option<PoolId>,
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Deposit from an external source token into an internal account
    pub fn deposit(
        owner_id: impl Into<OwnerId>,
        source: impl Into<AccountId>,
        to: impl Into<AccountId>,
        amount: Decimal,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            from: source.into(),
            to: to.into(),
            amount,
            transfer_type: TransferType::Deposit,
            pool_id: None,
            idempotency_key: None,
        }
    }

    /// Withdrawal from an internal account to an external destination
    pub fn withdrawal(
        owner_id: impl Into<OwnerId>,
        from: impl Into<AccountId>,
        destination: impl Into<AccountId>,
        amount: Decimal,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            from: from.into(),
            to: destination.into(),
            amount,
            transfer_type: TransferType::Withdrawal,
            pool_id: None,
            idempotency_key: None,
        }
    }

    /// Contribution from an internal account into a pool
    pub fn pool_contribution(
        owner_id: impl Into<OwnerId>,
        from: impl Into<AccountId>,
        pool_id: PoolId,
        amount: Decimal,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            from: from.into(),
            to: AccountId::from(&pool_id),
            amount,
            transfer_type: TransferType::PoolContribution,
            pool_id: Some(pool_id),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Filters for `TransferLedger::get_history`
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub transfer_type: Option<TransferType>,
    pub status: Option<TransferStatus>,
    pub pool_id: Option<PoolId>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    pub offset: usize,
    /// Page size; `None` uses the configured default
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.transfer_type.is_none_or(|t| t == transfer.transfer_type)
            && self.status.is_none_or(|s| s == transfer.status)
            && self
                .pool_id
                .as_ref()
                .is_none_or(|p| transfer.pool_id.as_ref() == Some(p))
            && self.since.is_none_or(|since| transfer.created_at >= since)
            && self.until.is_none_or(|until| transfer.created_at < until)
    }
}

/// One page of a paginated query
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching rows across all pages
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}
