//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `ids`: Account, owner, pool and transfer identifiers
//! - `account`: Account state and balance-adjustment reasons
//! - `transfer`: Transfer rows, requests and history queries
//! - `pool`: Savings pools and memberships
//! - `accrual`: Daily revenue and interest records
//! - `event`: Domain events published after commit
//! - `error`: Error types for the ledger

pub mod account;
pub mod accrual;
pub mod error;
pub mod event;
pub mod ids;
pub mod pool;
pub mod transfer;

pub use account::{Account, AccountStatus, BalanceReason};
pub use accrual::{AccrualSummary, DailyAccrualRecord, InterestRecord};
pub use error::{ErrorKind, LedgerError};
pub use event::DomainEvent;
pub use ids::{AccountId, OwnerId, PoolId, TransferId};
pub use pool::{
    Frequency, MemberRole, Membership, MembershipStatus, NewPool, Pool, PoolRecord, PoolStatus,
};
pub use transfer::{HistoryFilter, Page, Transfer, TransferRequest, TransferStatus, TransferType};
