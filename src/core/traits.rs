//! Core traits for storage, transactions, time and event publishing
//!
//! The ledger components never reach for process-wide state: each one is
//! handed an `Arc<S: LedgerStore>`, a [`Clock`] and an [`EventSink`].

use crate::types::{
    Account, AccountId, DailyAccrualRecord, DomainEvent, InterestRecord, LedgerError, OwnerId,
    PoolId, PoolRecord, Transfer, TransferId,
};
use chrono::{DateTime, NaiveDate, Utc};

/// The serialization points a transaction needs before it starts
///
/// Locks are always taken in the same global order: owner, then accounts by
/// ascending id, then the pool. Listing an account twice is harmless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockScope {
    pub owner: Option<OwnerId>,
    pub accounts: Vec<AccountId>,
    pub pool: Option<PoolId>,
}

impl LockScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_owner(owner: &OwnerId) -> Self {
        Self {
            owner: Some(owner.clone()),
            ..Self::default()
        }
    }

    pub fn with_account(mut self, account: &AccountId) -> Self {
        self.accounts.push(account.clone());
        self
    }

    pub fn with_pool(mut self, pool: &PoolId) -> Self {
        self.pool = Some(pool.clone());
        self
    }
}

/// A unit of work running under the locks of a [`LockScope`]
///
/// Every write is staged on the transaction and becomes visible only when the
/// closure passed to [`LedgerStore::with_transaction`] returns `Ok`.
pub trait LedgerTransaction {
    /// Read a locked account
    fn account(&self, id: &AccountId) -> Result<&Account, LedgerError>;

    /// Mutable working copy of a locked account
    fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, LedgerError>;

    /// Look up a transfer, including ones staged by this transaction
    fn transfer(&self, id: TransferId) -> Option<Transfer>;

    fn find_by_idempotency_key(&self, owner: &OwnerId, key: &str) -> Option<Transfer>;

    /// The owner's transfers created at or after `since`
    ///
    /// Only consistent when the scope holds that owner's lock.
    fn owner_transfers_since(&self, owner: &OwnerId, since: DateTime<Utc>) -> Vec<Transfer>;

    /// Insert a new transfer or replace a staged/stored one with the same id
    fn put_transfer(&mut self, transfer: Transfer) -> Result<(), LedgerError>;

    /// Mutable working copy of the locked pool, or of a pool inserted by this transaction
    fn pool_mut(&mut self, id: &PoolId) -> Result<&mut PoolRecord, LedgerError>;

    fn insert_pool(&mut self, record: PoolRecord) -> Result<(), LedgerError>;

    fn interest_record(&self, account: &AccountId, date: NaiveDate) -> Option<InterestRecord>;

    /// Fails if `(account, date)` is already recorded
    fn insert_interest_record(&mut self, record: InterestRecord) -> Result<(), LedgerError>;

    /// Fails if `date` is already recorded
    fn insert_revenue_record(&mut self, record: DailyAccrualRecord) -> Result<(), LedgerError>;
}

/// Storage behind the ledger core
///
/// Reads outside a transaction return snapshots. All mutation goes through
/// [`LedgerStore::with_transaction`], except account creation which is a
/// single-row insert.
pub trait LedgerStore: Send + Sync {
    /// Run `f` under the locks of `scope`, committing its staged writes on `Ok`
    ///
    /// On `Err` nothing `f` staged is applied.
    fn with_transaction<T, F>(&self, scope: &LockScope, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTransaction) -> Result<T, LedgerError>;

    /// Fails with `DuplicateAccount` if the id is taken
    fn insert_account(&self, account: Account) -> Result<(), LedgerError>;

    fn account(&self, id: &AccountId) -> Option<Account>;

    /// All accounts, sorted by id
    fn accounts(&self) -> Vec<Account>;

    fn transfer(&self, id: TransferId) -> Option<Transfer>;

    /// All of an owner's transfers in insertion order
    fn owner_transfers(&self, owner: &OwnerId) -> Vec<Transfer>;

    fn pool(&self, id: &PoolId) -> Option<PoolRecord>;

    fn revenue_record(&self, date: NaiveDate) -> Option<DailyAccrualRecord>;

    /// The most recent revenue record strictly before `date`
    fn latest_revenue_before(&self, date: NaiveDate) -> Option<DailyAccrualRecord>;

    fn interest_record(&self, account: &AccountId, date: NaiveDate) -> Option<InterestRecord>;

    fn interest_records_for(&self, date: NaiveDate) -> Vec<InterestRecord>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Fire-and-forget sink for domain events
///
/// Called after commit. Implementations must not fail the caller: a delivery
/// problem never rolls back a completed transfer.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}
