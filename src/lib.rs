//! Savings Ledger Library
//! # Overview
//!
//! This library provides the ledger core of a savings product: account
//! balances, money movements with limits and idempotency, group savings
//! pools, and a daily interest accrual job. Every balance change runs in a
//! single store transaction, so a failed operation leaves no partial writes.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transfer, Pool, etc.)
//! - [`config`] - YAML configuration with defaults
//! - [`logging`] - Tracing subscriber setup
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::account_store`] - Account identity, balances and status
//!   - [`core::ledger`] - Transfer recording, limits, idempotency and lifecycle
//!   - [`core::pools`] - Savings pool membership and contributions
//!   - [`core::accrual`] - Daily float revenue and user interest
//!   - [`core::scheduler`] - Background task driving the accrual
//!   - [`core::memory_store`] - In-memory transactional store
//! - [`io`] - CSV command parsing and account output
//! - [`replay`] - Runs a command file through the engine
//!
//! # Transfer Types
//!
//! - **Deposit**: Credit funds from an external source to an account
//! - **Withdrawal**: Debit an account, plus a flat fee, to an external destination
//! - **Pool contribution**: Move funds from an account into a savings pool
//! - **Pool distribution**: Recorded type only; new distributions are rejected
//!
//! Interest is not a transfer: the accrual job credits it directly and keeps
//! one record per account and day.
//!
//! # Account States
//!
//! Each account maintains:
//! - `balance`: Funds available, never negative
//! - `interest_earned`: Running total of accrued interest
//! - `status`: `active` or `inactive`; inactive accounts reject new movements

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod replay;
pub mod types;

pub use config::AppConfig;
pub use core::{AccountStore, AccrualJob, LedgerEngine, MemoryStore, PoolEngine, TransferLedger};
pub use io::write_accounts_csv;
pub use replay::Replay;
pub use types::{
    Account, AccountId, DomainEvent, LedgerError, OwnerId, Pool, PoolId, Transfer, TransferId,
    TransferRequest, TransferStatus, TransferType,
};
