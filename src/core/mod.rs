//! Core business logic module
//!
//! This module contains the ledger components and the storage they run on:
//! - `traits` - Store, transaction, clock and event sink abstractions
//! - `memory_store` - In-memory `LedgerStore` with ordered row locks
//! - `account_store` - Account identity, balances and status
//! - `ledger` - Transfer recording, limits, idempotency and lifecycle
//! - `pools` - Savings pool lifecycle and contributions
//! - `accrual` - Daily float revenue and user interest
//! - `scheduler` - Background task running the accrual once per day
//! - `engine` - Wires the components to one store

pub mod account_store;
pub mod accrual;
pub mod clock;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod memory_store;
pub mod pools;
pub mod scheduler;
pub mod traits;

pub use account_store::{apply_adjustment, AccountStore};
pub use accrual::AccrualJob;
pub use clock::{LedgerCalendar, ManualClock, SystemClock};
pub use engine::LedgerEngine;
pub use events::{ChannelEventSink, LoggingEventSink, NoopEventSink};
pub use ledger::TransferLedger;
pub use memory_store::MemoryStore;
pub use pools::PoolEngine;
pub use scheduler::{next_run_after, AccrualScheduler};
pub use traits::{Clock, EventSink, LedgerStore, LedgerTransaction, LockScope};
