//! Ledger engine
//!
//! Wires the account store, transfer ledger, pool engine and accrual job to one
//! shared store, clock and event sink. Callers (the replay CLI, an API layer)
//! reach every operation through the component accessors.

use super::account_store::AccountStore;
use super::accrual::AccrualJob;
use super::clock::LedgerCalendar;
use super::ledger::TransferLedger;
use super::memory_store::MemoryStore;
use super::pools::PoolEngine;
use super::scheduler::AccrualScheduler;
use super::traits::{Clock, EventSink, LedgerStore};
use crate::config::AppConfig;
use crate::types::LedgerError;
use chrono::NaiveDate;
use std::sync::Arc;

pub struct LedgerEngine<S> {
    store: Arc<S>,
    accounts: AccountStore<S>,
    ledger: Arc<TransferLedger<S>>,
    pools: PoolEngine<S>,
    accrual: Arc<AccrualJob<S>>,
    calendar: LedgerCalendar,
    clock: Arc<dyn Clock>,
}

impl LedgerEngine<MemoryStore> {
    /// An engine over a fresh in-memory store
    pub fn in_memory(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        Self::new(Arc::new(MemoryStore::new()), config, clock, events)
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(
        store: Arc<S>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let calendar = LedgerCalendar::new(config.ledger.offset()?);

        let ledger = Arc::new(TransferLedger::new(
            Arc::clone(&store),
            config.ledger.clone(),
            Arc::clone(&clock),
            events,
        )?);
        let pools = PoolEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            calendar,
            Arc::clone(&clock),
        );
        let accounts = AccountStore::new(Arc::clone(&store), Arc::clone(&clock));
        let accrual = Arc::new(AccrualJob::new(Arc::clone(&store), config.accrual.clone())?);

        Ok(Self {
            store,
            accounts,
            ledger,
            pools,
            accrual,
            calendar,
            clock,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn accounts(&self) -> &AccountStore<S> {
        &self.accounts
    }

    pub fn ledger(&self) -> &TransferLedger<S> {
        &self.ledger
    }

    pub fn pools(&self) -> &PoolEngine<S> {
        &self.pools
    }

    pub fn accrual(&self) -> &AccrualJob<S> {
        &self.accrual
    }

    /// Today's date in the ledger's time zone
    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.now())
    }
}

impl<S: LedgerStore + 'static> LedgerEngine<S> {
    /// A scheduler driving this engine's accrual job
    pub fn accrual_scheduler(&self) -> AccrualScheduler<S> {
        AccrualScheduler::new(
            Arc::clone(&self.accrual),
            self.calendar,
            Arc::clone(&self.clock),
        )
    }
}
