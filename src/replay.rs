//! Replay of a command file through the ledger engine
//!
//! Each row runs through the same operations an API layer would call. A row
//! the ledger rejects is logged and skipped; only I/O problems stop the
//! replay. The final account states are written as CSV.

use crate::config::AppConfig;
use crate::core::{Clock, LedgerEngine, LoggingEventSink, ManualClock, MemoryStore};
use crate::io::{write_accounts_csv, CommandReader, CommandRow, LedgerCommand};
use crate::types::{LedgerError, NewPool, OwnerId, PoolId, TransferId, TransferRequest};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Clock position for rows without an `at` column, before any row sets one
fn replay_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

const REPLAY_FAILURE_REASON: &str = "reported failed by replay";

pub struct Replay {
    engine: LedgerEngine<MemoryStore>,
    clock: Arc<ManualClock>,
    /// Replay-file pool labels to generated pool ids
    pools: HashMap<String, PoolId>,
    /// Held transfers by owner and key
    held: HashMap<(OwnerId, String), TransferId>,
}

impl Replay {
    pub fn new(config: &AppConfig) -> Result<Self, LedgerError> {
        let clock = Arc::new(ManualClock::new(replay_epoch()));
        let engine = LedgerEngine::in_memory(config, clock.clone(), Arc::new(LoggingEventSink))?;
        Ok(Self {
            engine,
            clock,
            pools: HashMap::new(),
            held: HashMap::new(),
        })
    }

    pub fn engine(&self) -> &LedgerEngine<MemoryStore> {
        &self.engine
    }

    /// Replay `input` and write the resulting accounts to `output`
    pub fn run(&mut self, input: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let reader = CommandReader::new(input)?;
        let mut applied = 0usize;
        let mut rejected = 0usize;

        for row in reader {
            let outcome = row.and_then(|row| self.apply(row));
            match outcome {
                Ok(()) => applied += 1,
                Err(e @ LedgerError::Io { .. }) => return Err(e),
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, kind = ?e.kind(), "row rejected");
                }
            }
        }

        info!(applied, rejected, "replay finished");
        write_accounts_csv(&self.engine.accounts().list_accounts(), output)
    }

    /// Apply a single command
    pub fn apply(&mut self, row: CommandRow) -> Result<(), LedgerError> {
        if let Some(at) = row.at {
            if at < self.clock.now() {
                debug!(%at, "timestamp earlier than previous row");
            }
            self.clock.set(at);
        }

        let engine = &self.engine;
        match row.command {
            LedgerCommand::Open { owner, account } => {
                engine.accounts().open_account(account, owner)?;
            }
            LedgerCommand::Deactivate { account } => {
                engine.accounts().deactivate_account(&account)?;
            }
            LedgerCommand::Deposit {
                owner,
                account,
                amount,
                key,
            } => {
                let mut request = TransferRequest::deposit(owner, "external", account, amount);
                request.idempotency_key = key;
                engine.ledger().create_transfer(request)?;
            }
            LedgerCommand::Withdraw {
                owner,
                account,
                amount,
                key,
            } => {
                let mut request = TransferRequest::withdrawal(owner, account, "external", amount);
                request.idempotency_key = key;
                engine.ledger().create_transfer(request)?;
            }
            LedgerCommand::HoldWithdrawal {
                owner,
                account,
                amount,
                key,
            } => {
                let request =
                    TransferRequest::withdrawal(owner.clone(), account, "external", amount)
                        .with_idempotency_key(key.clone());
                let transfer = engine.ledger().submit_transfer(request)?;
                self.held.insert((owner, key), transfer.id);
            }
            LedgerCommand::Settle { owner, key } => {
                let id = self.held_transfer(&owner, &key)?;
                engine.ledger().complete_transfer(id, &owner)?;
            }
            LedgerCommand::Fail { owner, key } => {
                let id = self.held_transfer(&owner, &key)?;
                engine
                    .ledger()
                    .fail_transfer(id, &owner, REPLAY_FAILURE_REASON)?;
            }
            LedgerCommand::Cancel { owner, key } => {
                let id = self.held_transfer(&owner, &key)?;
                engine.ledger().cancel_transfer(id, &owner)?;
            }
            LedgerCommand::CreatePool {
                owner,
                pool,
                goal,
                contribution,
                start,
                end,
                members,
                frequency,
            } => {
                if self.pools.contains_key(&pool) {
                    return Err(LedgerError::validation(format!(
                        "pool label '{}' is already in use",
                        pool
                    )));
                }
                let created = engine.pools().create_pool(NewPool {
                    creator_id: owner,
                    name: pool.clone(),
                    goal_amount: goal,
                    contribution_amount: contribution,
                    frequency,
                    start_date: start,
                    end_date: end,
                    max_members: members,
                })?;
                self.pools.insert(pool, created.pool_id);
            }
            LedgerCommand::JoinPool {
                owner,
                pool,
                contribution,
            } => {
                let pool_id = self.pool_id(&pool)?;
                engine.pools().join_pool(&pool_id, &owner, contribution)?;
            }
            LedgerCommand::Contribute {
                owner,
                pool,
                account,
                amount,
                key,
            } => {
                let pool_id = self.pool_id(&pool)?;
                engine
                    .pools()
                    .contribute(&pool_id, &owner, amount, &account, key)?;
            }
            LedgerCommand::LeavePool { owner, pool } => {
                let pool_id = self.pool_id(&pool)?;
                engine.pools().leave_pool(&pool_id, &owner)?;
            }
            LedgerCommand::CancelPool { owner, pool } => {
                let pool_id = self.pool_id(&pool)?;
                engine.pools().cancel_pool(&pool_id, &owner)?;
            }
            LedgerCommand::Accrue { date } => {
                let date = date.unwrap_or_else(|| engine.today());
                engine.accrual().run_daily_accrual(date)?;
            }
        }
        Ok(())
    }

    fn pool_id(&self, label: &str) -> Result<PoolId, LedgerError> {
        self.pools
            .get(label)
            .cloned()
            .ok_or_else(|| LedgerError::pool_not_found(label))
    }

    fn held_transfer(&self, owner: &OwnerId, key: &str) -> Result<TransferId, LedgerError> {
        self.held
            .get(&(owner.clone(), key.to_string()))
            .copied()
            .ok_or_else(|| LedgerError::transfer_not_found(format!("{}/{}", owner, key)))
    }
}
