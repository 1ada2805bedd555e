//! Transfer ledger
//!
//! This module records every money movement and applies its balance effects.
//!
//! # Processing
//!
//! A transfer runs inside one store transaction holding, in order, the owner's
//! lock, the touched accounts and the pool (for contributions):
//!
//! 1. Idempotent replay: a known `(owner, key)` returns the stored transfer
//! 2. Daily and monthly limits over the owner's live transfers
//! 3. Debit side: internal account (and fee for withdrawals)
//! 4. Credit side: internal account or pool, unless the transfer is deferred
//! 5. Transfer row written with its final status
//!
//! Any error rolls the whole transaction back. Events go out after commit.
//!
//! # Deferred Transfers
//!
//! `submit_transfer` holds the debit and leaves the transfer pending until the
//! external rail reports back through `complete_transfer` or `fail_transfer`.
//! A pending transfer can still be cancelled, which returns the held debit.

use super::account_store::apply_adjustment;
use super::clock::LedgerCalendar;
use super::traits::{Clock, EventSink, LedgerStore, LedgerTransaction, LockScope};
use crate::config::LedgerConfig;
use crate::types::{
    Account, AccountId, BalanceReason, DomainEvent, HistoryFilter, LedgerError, OwnerId, Page,
    PoolId, PoolStatus, Transfer, TransferId, TransferRequest, TransferStatus, TransferType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// When the credit side of a new transfer is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Immediate,
    Deferred,
}

enum Executed {
    Replayed(Transfer),
    Created {
        transfer: Transfer,
        goal_event: Option<DomainEvent>,
    },
}

pub struct TransferLedger<S> {
    store: Arc<S>,
    config: LedgerConfig,
    calendar: LedgerCalendar,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl<S: LedgerStore> TransferLedger<S> {
    pub fn new(
        store: Arc<S>,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let calendar = LedgerCalendar::new(config.offset()?);
        Ok(Self {
            store,
            config,
            calendar,
            clock,
            events,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Create a transfer and settle it immediately
    pub fn create_transfer(&self, request: TransferRequest) -> Result<Transfer, LedgerError> {
        self.execute(request, Settlement::Immediate)
    }

    /// Create a pending transfer holding only its debit side
    pub fn submit_transfer(&self, request: TransferRequest) -> Result<Transfer, LedgerError> {
        self.execute(request, Settlement::Deferred)
    }

    pub fn mark_processing(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
    ) -> Result<Transfer, LedgerError> {
        let (transfer, _) = self.transition(transfer_id, owner_id, |_, transfer| {
            if transfer.status != TransferStatus::Pending {
                return Err(LedgerError::invalid_transfer_state(
                    transfer.id,
                    transfer.status,
                    "start processing",
                ));
            }
            transfer.status = TransferStatus::Processing;
            Ok(None)
        })?;
        debug!(transfer_id = %transfer.id, "transfer processing");
        Ok(transfer)
    }

    /// Settle a pending or processing transfer by applying its credit side
    pub fn complete_transfer(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
    ) -> Result<Transfer, LedgerError> {
        let (transfer, goal_event) = self.transition(transfer_id, owner_id, |tx, transfer| {
            if !matches!(
                transfer.status,
                TransferStatus::Pending | TransferStatus::Processing
            ) {
                return Err(LedgerError::invalid_transfer_state(
                    transfer.id,
                    transfer.status,
                    "complete",
                ));
            }
            let goal_event = apply_credit(tx, transfer)?;
            transfer.status = TransferStatus::Completed;
            Ok(goal_event)
        })?;
        info!(transfer_id = %transfer.id, kind = %transfer.transfer_type, "transfer completed");
        self.publish_completed(&transfer, goal_event);
        Ok(transfer)
    }

    /// Mark a pending or processing transfer failed and return its held debit
    pub fn fail_transfer(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
        reason: &str,
    ) -> Result<Transfer, LedgerError> {
        let (transfer, _) = self.transition(transfer_id, owner_id, |tx, transfer| {
            if !matches!(
                transfer.status,
                TransferStatus::Pending | TransferStatus::Processing
            ) {
                return Err(LedgerError::invalid_transfer_state(
                    transfer.id,
                    transfer.status,
                    "fail",
                ));
            }
            reverse_debit(tx, transfer)?;
            transfer.status = TransferStatus::Failed;
            transfer.failure_reason = Some(reason.to_string());
            Ok(None)
        })?;
        warn!(transfer_id = %transfer.id, reason, "transfer failed");
        Ok(transfer)
    }

    /// Cancel a pending transfer, returning its held debit
    ///
    /// Anything past pending is `TransferNotCancellable`; a completed transfer
    /// is never reversed.
    pub fn cancel_transfer(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
    ) -> Result<Transfer, LedgerError> {
        let (transfer, _) = self.transition(transfer_id, owner_id, |tx, transfer| {
            if transfer.status != TransferStatus::Pending {
                return Err(LedgerError::transfer_not_cancellable(
                    transfer.id,
                    transfer.status,
                ));
            }
            reverse_debit(tx, transfer)?;
            transfer.status = TransferStatus::Cancelled;
            Ok(None)
        })?;
        info!(transfer_id = %transfer.id, "transfer cancelled");
        Ok(transfer)
    }

    /// A transfer owned by `owner_id`
    ///
    /// Other owners' transfers are reported as not found.
    pub fn get_transfer(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
    ) -> Result<Transfer, LedgerError> {
        self.store
            .transfer(transfer_id)
            .filter(|t| &t.owner_id == owner_id)
            .ok_or_else(|| LedgerError::transfer_not_found(transfer_id))
    }

    /// One page of an owner's transfers, newest first
    pub fn get_history(&self, owner_id: &OwnerId, filter: &HistoryFilter) -> Page<Transfer> {
        let mut matching: Vec<Transfer> = self
            .store
            .owner_transfers(owner_id)
            .into_iter()
            .rev()
            .filter(|t| filter.matches(t))
            .collect();
        // Stable, so equal timestamps stay newest-inserted first
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = filter
            .limit
            .unwrap_or(self.config.history_default_page_size)
            .clamp(1, self.config.history_max_page_size);
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();

        Page {
            items,
            total,
            offset: filter.offset,
            limit,
        }
    }

    fn execute(
        &self,
        request: TransferRequest,
        settlement: Settlement,
    ) -> Result<Transfer, LedgerError> {
        validate_request(&request)?;

        let scope = lock_scope(
            &request.owner_id,
            request.transfer_type,
            &request.from,
            &request.to,
            request.pool_id.as_ref(),
        );

        let executed = self.store.with_transaction(&scope, |tx| {
            if let Some(key) = &request.idempotency_key {
                if let Some(existing) = tx.find_by_idempotency_key(&request.owner_id, key) {
                    if !existing.matches_request(&request) {
                        warn!(
                            owner = %request.owner_id,
                            key = %key,
                            transfer_id = %existing.id,
                            "idempotency key reused with different arguments, returning original"
                        );
                    }
                    return Ok(Executed::Replayed(existing));
                }
            }

            let now = self.clock.now();
            self.check_limits(tx, &request, now)?;

            let fee = if request.transfer_type == TransferType::Withdrawal {
                self.config.withdrawal_fee
            } else {
                Decimal::ZERO
            };
            let mut transfer = Transfer {
                id: TransferId::new(),
                idempotency_key: request.idempotency_key.clone(),
                owner_id: request.owner_id.clone(),
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount,
                fee,
                transfer_type: request.transfer_type,
                pool_id: request.pool_id.clone(),
                status: TransferStatus::Pending,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            };

            apply_debit(tx, &transfer)?;
            let goal_event = match settlement {
                Settlement::Immediate => {
                    let event = apply_credit(tx, &transfer)?;
                    transfer.status = TransferStatus::Completed;
                    event
                }
                Settlement::Deferred => None,
            };

            tx.put_transfer(transfer.clone())?;
            Ok(Executed::Created {
                transfer,
                goal_event,
            })
        })?;

        match executed {
            Executed::Replayed(transfer) => {
                debug!(transfer_id = %transfer.id, "idempotent replay");
                Ok(transfer)
            }
            Executed::Created {
                transfer,
                goal_event,
            } => {
                info!(
                    transfer_id = %transfer.id,
                    owner = %transfer.owner_id,
                    kind = %transfer.transfer_type,
                    amount = %transfer.amount,
                    status = %transfer.status,
                    "transfer recorded"
                );
                if transfer.status == TransferStatus::Completed {
                    self.publish_completed(&transfer, goal_event);
                }
                Ok(transfer)
            }
        }
    }

    fn check_limits(
        &self,
        tx: &dyn LedgerTransaction,
        request: &TransferRequest,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let day_start = self.calendar.start_of_day(now);
        let month_start = self.calendar.start_of_month(now);

        let live: Vec<Transfer> = tx
            .owner_transfers_since(&request.owner_id, month_start)
            .into_iter()
            .filter(|t| t.status.counts_toward_limits())
            .collect();

        let daily_used = sum_amounts(live.iter().filter(|t| t.created_at >= day_start));
        let daily_total = daily_used.and_then(|used| used.checked_add(request.amount));
        if daily_total.map_or(true, |total| total > self.config.daily_limit) {
            return Err(LedgerError::daily_limit_exceeded(
                &request.owner_id,
                daily_used.unwrap_or(Decimal::MAX),
                request.amount,
                self.config.daily_limit,
            ));
        }

        let monthly_used = sum_amounts(live.iter());
        let monthly_total = monthly_used.and_then(|used| used.checked_add(request.amount));
        if monthly_total.map_or(true, |total| total > self.config.monthly_limit) {
            return Err(LedgerError::monthly_limit_exceeded(
                &request.owner_id,
                monthly_used.unwrap_or(Decimal::MAX),
                request.amount,
                self.config.monthly_limit,
            ));
        }

        Ok(())
    }

    /// Run a status change on an existing transfer under its full lock scope
    fn transition<F>(
        &self,
        transfer_id: TransferId,
        owner_id: &OwnerId,
        change: F,
    ) -> Result<(Transfer, Option<DomainEvent>), LedgerError>
    where
        F: FnOnce(
            &mut dyn LedgerTransaction,
            &mut Transfer,
        ) -> Result<Option<DomainEvent>, LedgerError>,
    {
        let known = self.get_transfer(transfer_id, owner_id)?;
        let scope = lock_scope(
            owner_id,
            known.transfer_type,
            &known.from,
            &known.to,
            known.pool_id.as_ref(),
        );

        self.store.with_transaction(&scope, |tx| {
            let mut transfer = tx
                .transfer(transfer_id)
                .ok_or_else(|| LedgerError::transfer_not_found(transfer_id))?;
            let event = change(tx, &mut transfer)?;
            transfer.updated_at = self.clock.now();
            tx.put_transfer(transfer.clone())?;
            Ok((transfer, event))
        })
    }

    fn publish_completed(&self, transfer: &Transfer, goal_event: Option<DomainEvent>) {
        self.events.publish(DomainEvent::TransferCompleted {
            transfer: transfer.clone(),
        });
        if let Some(event) = goal_event {
            self.events.publish(event);
        }
    }
}

/// Sum of transfer amounts, `None` on overflow
fn sum_amounts<'a>(mut transfers: impl Iterator<Item = &'a Transfer>) -> Option<Decimal> {
    transfers.try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.amount))
}

fn validate_request(request: &TransferRequest) -> Result<(), LedgerError> {
    if request.amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            request.amount,
            "must be positive",
        ));
    }
    match request.transfer_type {
        TransferType::PoolContribution => match &request.pool_id {
            None => Err(LedgerError::validation(
                "pool contribution requires a pool id",
            )),
            Some(pool_id) if request.to != AccountId::from(pool_id) => Err(
                LedgerError::validation("pool contribution must target its pool"),
            ),
            Some(_) => Ok(()),
        },
        TransferType::PoolDistribution => Err(LedgerError::validation(
            "pool distributions are not accepted",
        )),
        TransferType::Deposit | TransferType::Withdrawal => Ok(()),
    }
}

/// Locks a transfer of this shape needs
///
/// Only internal endpoints are locked: a deposit's source and a withdrawal's
/// destination are external tokens.
fn lock_scope(
    owner_id: &OwnerId,
    transfer_type: TransferType,
    from: &AccountId,
    to: &AccountId,
    pool_id: Option<&PoolId>,
) -> LockScope {
    let scope = LockScope::for_owner(owner_id);
    match transfer_type {
        TransferType::Deposit => scope.with_account(to),
        TransferType::Withdrawal => scope.with_account(from),
        TransferType::PoolContribution | TransferType::PoolDistribution => {
            let scope = scope.with_account(from);
            match pool_id {
                Some(pool_id) => scope.with_pool(pool_id),
                None => scope,
            }
        }
    }
}

fn owned_account_mut<'a>(
    tx: &'a mut dyn LedgerTransaction,
    account_id: &AccountId,
    owner_id: &OwnerId,
) -> Result<&'a mut Account, LedgerError> {
    let account = tx.account_mut(account_id)?;
    if &account.owner_id != owner_id {
        return Err(LedgerError::account_owner_mismatch(account_id, owner_id));
    }
    Ok(account)
}

fn contribution_pool(transfer: &Transfer) -> Result<&PoolId, LedgerError> {
    transfer
        .pool_id
        .as_ref()
        .ok_or_else(|| LedgerError::validation("pool contribution requires a pool id"))
}

/// Apply the debit side of a new transfer
///
/// Deposits have no internal debit, but their target is checked here so a
/// deferred deposit cannot be accepted into an account it can never credit.
fn apply_debit(tx: &mut dyn LedgerTransaction, transfer: &Transfer) -> Result<(), LedgerError> {
    let owner_id = &transfer.owner_id;
    match transfer.transfer_type {
        TransferType::Deposit => {
            let account = owned_account_mut(tx, &transfer.to, owner_id)?;
            if !account.is_active() {
                return Err(LedgerError::account_inactive(&transfer.to));
            }
        }
        TransferType::Withdrawal => {
            let account = owned_account_mut(tx, &transfer.from, owner_id)?;
            if !account.is_active() {
                return Err(LedgerError::account_inactive(&transfer.from));
            }
            let total = transfer.debit_total()?;
            if account.balance < total {
                return Err(LedgerError::insufficient_funds(
                    &transfer.from,
                    account.balance,
                    total,
                ));
            }
            apply_adjustment(account, -transfer.amount, BalanceReason::Withdrawal)?;
            if transfer.fee > Decimal::ZERO {
                apply_adjustment(account, -transfer.fee, BalanceReason::Fee)?;
            }
        }
        TransferType::PoolContribution => {
            let pool_id = contribution_pool(transfer)?;
            let record = tx.pool_mut(pool_id)?;
            if record.pool.status != PoolStatus::Active {
                return Err(LedgerError::pool_inactive(pool_id, record.pool.status));
            }
            if record.active_membership(owner_id).is_none() {
                return Err(LedgerError::not_a_member(pool_id, owner_id));
            }
            let account = owned_account_mut(tx, &transfer.from, owner_id)?;
            apply_adjustment(account, -transfer.amount, BalanceReason::PoolContribution)?;
        }
        TransferType::PoolDistribution => {
            return Err(LedgerError::validation(
                "pool distributions are not accepted",
            ));
        }
    }
    Ok(())
}

/// Apply the credit side, returning a goal event if a pool crossed its goal
fn apply_credit(
    tx: &mut dyn LedgerTransaction,
    transfer: &Transfer,
) -> Result<Option<DomainEvent>, LedgerError> {
    match transfer.transfer_type {
        TransferType::Deposit => {
            let account = owned_account_mut(tx, &transfer.to, &transfer.owner_id)?;
            apply_adjustment(account, transfer.amount, BalanceReason::Deposit)?;
            Ok(None)
        }
        TransferType::Withdrawal => Ok(None),
        TransferType::PoolContribution => {
            let pool_id = contribution_pool(transfer)?;
            let record = tx.pool_mut(pool_id)?;
            // A deferred contribution may settle after the pool or membership changed
            if record.pool.status != PoolStatus::Active {
                return Err(LedgerError::pool_inactive(pool_id, record.pool.status));
            }
            if record.active_membership(&transfer.owner_id).is_none() {
                return Err(LedgerError::not_a_member(pool_id, &transfer.owner_id));
            }
            let already_reached = record.pool.goal_reached();

            record.pool.current_amount = record
                .pool
                .current_amount
                .checked_add(transfer.amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("pool contribution"))?;
            let membership = record
                .members
                .get_mut(&transfer.owner_id)
                .ok_or_else(|| LedgerError::not_a_member(pool_id, &transfer.owner_id))?;
            membership.total_contributed = membership
                .total_contributed
                .checked_add(transfer.amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("pool contribution"))?;

            if !already_reached && record.pool.goal_reached() {
                Ok(Some(DomainEvent::PoolGoalReached {
                    pool_id: pool_id.clone(),
                    goal_amount: record.pool.goal_amount,
                    current_amount: record.pool.current_amount,
                }))
            } else {
                Ok(None)
            }
        }
        TransferType::PoolDistribution => Err(LedgerError::validation(
            "pool distributions are not accepted",
        )),
    }
}

/// Return a held debit to its account
///
/// Credits even an account deactivated since the debit.
fn reverse_debit(tx: &mut dyn LedgerTransaction, transfer: &Transfer) -> Result<(), LedgerError> {
    match transfer.transfer_type {
        TransferType::Withdrawal | TransferType::PoolContribution => {
            let account = tx.account_mut(&transfer.from)?;
            let total = transfer.debit_total()?;
            apply_adjustment(account, total, BalanceReason::Reversal)?;
            Ok(())
        }
        TransferType::Deposit | TransferType::PoolDistribution => Ok(()),
    }
}
