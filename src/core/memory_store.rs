//! In-memory ledger store
//!
//! This module provides `MemoryStore`, the `LedgerStore` implementation used by
//! the CLI, the tests and the benchmarks.
//!
//! # Design
//!
//! Rows live in `DashMap`s. Accounts and pools additionally sit behind their own
//! `Arc<Mutex<_>>` so a transaction can hold several of them at once: the `Arc`
//! is cloned out of the map first, so no shard lock is held while waiting on a
//! row lock.
//!
//! A transaction works on copies of the rows it locked and stages its inserts.
//! Commit writes everything back while the locks are still held; an error from
//! the closure simply drops the copies.
//!
//! # Lock Order
//!
//! ```text
//! owner lock ──> account locks (ascending id) ──> pool lock
//! ```

use super::traits::{LedgerStore, LedgerTransaction, LockScope};
use crate::types::{
    Account, AccountId, DailyAccrualRecord, InterestRecord, LedgerError, OwnerId, PoolId,
    PoolRecord, Transfer, TransferId,
};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe in-memory implementation of [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    transfers: DashMap<TransferId, Transfer>,
    /// Transfer ids per owner, in insertion order
    owner_index: DashMap<OwnerId, Vec<TransferId>>,
    idempotency: DashMap<(OwnerId, String), TransferId>,
    pools: DashMap<PoolId, Arc<Mutex<PoolRecord>>>,
    owner_locks: DashMap<OwnerId, Arc<Mutex<()>>>,
    revenue: DashMap<NaiveDate, DailyAccrualRecord>,
    interest: DashMap<(AccountId, NaiveDate), InterestRecord>,
}

// Guarded values are only ever replaced wholesale at commit, so a poisoned
// lock still holds a consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_lock(&self, owner: &OwnerId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.owner_locks
                .entry(owner.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    fn account_handle(&self, id: &AccountId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn pool_handle(&self, id: &PoolId) -> Option<Arc<Mutex<PoolRecord>>> {
        self.pools.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn owner_transfer_ids(&self, owner: &OwnerId) -> Vec<TransferId> {
        self.owner_index
            .get(owner)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Apply the staged writes of a successful transaction
    ///
    /// Called while every lock of the transaction's scope is still held.
    fn commit_staged(&self, staged: Staged) {
        for transfer in staged.transfers {
            if !self.transfers.contains_key(&transfer.id) {
                self.owner_index
                    .entry(transfer.owner_id.clone())
                    .or_default()
                    .push(transfer.id);
                if let Some(key) = &transfer.idempotency_key {
                    self.idempotency
                        .insert((transfer.owner_id.clone(), key.clone()), transfer.id);
                }
            }
            self.transfers.insert(transfer.id, transfer);
        }

        for id in staged.new_pools {
            if let Some(record) = staged.pools.get(&id) {
                self.pools
                    .insert(id.clone(), Arc::new(Mutex::new(record.clone())));
            }
        }

        for record in staged.interest {
            self.interest
                .insert((record.account_id.clone(), record.date), record);
        }

        for record in staged.revenue {
            self.revenue.entry(record.date).or_insert(record);
        }
    }
}

/// Writes collected by a [`MemoryTransaction`]
#[derive(Debug, Default)]
struct Staged {
    accounts: BTreeMap<AccountId, Account>,
    pools: BTreeMap<PoolId, PoolRecord>,
    new_pools: Vec<PoolId>,
    transfers: Vec<Transfer>,
    interest: Vec<InterestRecord>,
    revenue: Vec<DailyAccrualRecord>,
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: Staged,
}

impl MemoryTransaction<'_> {
    fn out_of_scope(&self, what: &str, id: &str) -> LedgerError {
        LedgerError::storage(format!("{} {} is not locked by this transaction", what, id))
    }
}

impl LedgerTransaction for MemoryTransaction<'_> {
    fn account(&self, id: &AccountId) -> Result<&Account, LedgerError> {
        match self.staged.accounts.get(id) {
            Some(account) => Ok(account),
            None if self.store.accounts.contains_key(id) => {
                Err(self.out_of_scope("account", id.as_str()))
            }
            None => Err(LedgerError::account_not_found(id)),
        }
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, LedgerError> {
        if !self.staged.accounts.contains_key(id) {
            return Err(if self.store.accounts.contains_key(id) {
                self.out_of_scope("account", id.as_str())
            } else {
                LedgerError::account_not_found(id)
            });
        }
        self.staged
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.staged
            .transfers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .or_else(|| self.store.transfer(id))
    }

    fn find_by_idempotency_key(&self, owner: &OwnerId, key: &str) -> Option<Transfer> {
        let staged = self.staged.transfers.iter().find(|t| {
            &t.owner_id == owner && t.idempotency_key.as_deref() == Some(key)
        });
        if let Some(transfer) = staged {
            return Some(transfer.clone());
        }
        let id = self
            .store
            .idempotency
            .get(&(owner.clone(), key.to_string()))
            .map(|entry| *entry.value())?;
        self.transfer(id)
    }

    fn owner_transfers_since(&self, owner: &OwnerId, since: DateTime<Utc>) -> Vec<Transfer> {
        let mut transfers: Vec<Transfer> = self
            .store
            .owner_transfer_ids(owner)
            .into_iter()
            .filter_map(|id| self.transfer(id))
            .collect();
        for staged in &self.staged.transfers {
            if &staged.owner_id == owner && !transfers.iter().any(|t| t.id == staged.id) {
                transfers.push(staged.clone());
            }
        }
        transfers.retain(|t| t.created_at >= since);
        transfers
    }

    fn put_transfer(&mut self, transfer: Transfer) -> Result<(), LedgerError> {
        if let Some(key) = &transfer.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(&transfer.owner_id, key) {
                if existing.id != transfer.id {
                    return Err(LedgerError::concurrency_conflict(format!(
                        "idempotency key '{}' already used by transfer {}",
                        key, existing.id
                    )));
                }
            }
        }
        match self
            .staged
            .transfers
            .iter_mut()
            .find(|t| t.id == transfer.id)
        {
            Some(slot) => *slot = transfer,
            None => self.staged.transfers.push(transfer),
        }
        Ok(())
    }

    fn pool_mut(&mut self, id: &PoolId) -> Result<&mut PoolRecord, LedgerError> {
        if !self.staged.pools.contains_key(id) {
            return Err(if self.store.pools.contains_key(id) {
                self.out_of_scope("pool", id.as_str())
            } else {
                LedgerError::pool_not_found(id)
            });
        }
        self.staged
            .pools
            .get_mut(id)
            .ok_or_else(|| LedgerError::pool_not_found(id))
    }

    fn insert_pool(&mut self, record: PoolRecord) -> Result<(), LedgerError> {
        let id = record.pool.pool_id.clone();
        if self.store.pools.contains_key(&id) || self.staged.pools.contains_key(&id) {
            return Err(LedgerError::validation(format!("pool {} already exists", id)));
        }
        self.staged.new_pools.push(id.clone());
        self.staged.pools.insert(id, record);
        Ok(())
    }

    fn interest_record(&self, account: &AccountId, date: NaiveDate) -> Option<InterestRecord> {
        self.staged
            .interest
            .iter()
            .find(|r| &r.account_id == account && r.date == date)
            .cloned()
            .or_else(|| self.store.interest_record(account, date))
    }

    fn insert_interest_record(&mut self, record: InterestRecord) -> Result<(), LedgerError> {
        if self.interest_record(&record.account_id, record.date).is_some() {
            return Err(LedgerError::concurrency_conflict(format!(
                "interest for {} on {} is already recorded",
                record.account_id, record.date
            )));
        }
        self.staged.interest.push(record);
        Ok(())
    }

    fn insert_revenue_record(&mut self, record: DailyAccrualRecord) -> Result<(), LedgerError> {
        let exists = self.store.revenue.contains_key(&record.date)
            || self.staged.revenue.iter().any(|r| r.date == record.date);
        if exists {
            return Err(LedgerError::concurrency_conflict(format!(
                "revenue for {} is already recorded",
                record.date
            )));
        }
        self.staged.revenue.push(record);
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn with_transaction<T, F>(&self, scope: &LockScope, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTransaction) -> Result<T, LedgerError>,
    {
        let owner_handle = scope.owner.as_ref().map(|owner| self.owner_lock(owner));
        let _owner_guard = owner_handle.as_deref().map(lock);

        let mut account_ids = scope.accounts.clone();
        account_ids.sort();
        account_ids.dedup();
        let account_handles: Vec<(AccountId, Arc<Mutex<Account>>)> = account_ids
            .into_iter()
            .filter_map(|id| self.account_handle(&id).map(|handle| (id, handle)))
            .collect();
        let mut account_guards: Vec<(&AccountId, MutexGuard<'_, Account>)> = account_handles
            .iter()
            .map(|(id, handle)| (id, lock(handle)))
            .collect();

        let pool_handle = scope
            .pool
            .as_ref()
            .and_then(|id| self.pool_handle(id).map(|handle| (id, handle)));
        let mut pool_guard = pool_handle
            .as_ref()
            .map(|(id, handle)| (*id, lock(handle)));

        let mut tx = MemoryTransaction {
            store: self,
            staged: Staged::default(),
        };
        for (id, guard) in &account_guards {
            tx.staged.accounts.insert((*id).clone(), (**guard).clone());
        }
        if let Some((id, guard)) = &pool_guard {
            tx.staged.pools.insert((*id).clone(), (**guard).clone());
        }

        let output = f(&mut tx)?;

        let mut staged = tx.staged;
        for (id, guard) in account_guards.iter_mut() {
            if let Some(updated) = staged.accounts.remove(*id) {
                **guard = updated;
            }
        }
        if let Some((id, guard)) = pool_guard.as_mut() {
            if let Some(updated) = staged.pools.remove(*id) {
                **guard = updated;
            }
        }
        self.commit_staged(staged);

        Ok(output)
    }

    fn insert_account(&self, account: Account) -> Result<(), LedgerError> {
        match self.accounts.entry(account.account_id.clone()) {
            Entry::Occupied(_) => {
                Err(LedgerError::duplicate_account(&account.account_id))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    fn account(&self, id: &AccountId) -> Option<Account> {
        let handle = self.account_handle(id)?;
        let account = lock(&handle).clone();
        Some(account)
    }

    fn accounts(&self) -> Vec<Account> {
        // Collect handles first so no shard lock is held while waiting on an account
        let mut handles: Vec<(AccountId, Arc<Mutex<Account>>)> = self
            .accounts
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
            .iter()
            .map(|(_, handle)| lock(handle).clone())
            .collect()
    }

    fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.transfers.get(&id).map(|entry| entry.value().clone())
    }

    fn owner_transfers(&self, owner: &OwnerId) -> Vec<Transfer> {
        self.owner_transfer_ids(owner)
            .into_iter()
            .filter_map(|id| self.transfer(id))
            .collect()
    }

    fn pool(&self, id: &PoolId) -> Option<PoolRecord> {
        let handle = self.pool_handle(id)?;
        let record = lock(&handle).clone();
        Some(record)
    }

    fn revenue_record(&self, date: NaiveDate) -> Option<DailyAccrualRecord> {
        self.revenue.get(&date).map(|entry| entry.value().clone())
    }

    fn latest_revenue_before(&self, date: NaiveDate) -> Option<DailyAccrualRecord> {
        self.revenue
            .iter()
            .filter(|entry| *entry.key() < date)
            .max_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone())
    }

    fn interest_record(&self, account: &AccountId, date: NaiveDate) -> Option<InterestRecord> {
        self.interest
            .get(&(account.clone(), date))
            .map(|entry| entry.value().clone())
    }

    fn interest_records_for(&self, date: NaiveDate) -> Vec<InterestRecord> {
        let mut records: Vec<InterestRecord> = self
            .interest
            .iter()
            .filter(|entry| entry.key().1 == date)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        records
    }
}
