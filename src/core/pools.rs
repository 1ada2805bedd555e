//! Savings pool lifecycle and contributions
//!
//! Contributions are ordinary ledger transfers of type `pool_contribution`:
//! the ledger bumps the pool's `current_amount` and the member's
//! `total_contributed` in the same transaction as the debit, so there is no
//! other path that changes them.

use super::clock::LedgerCalendar;
use super::ledger::TransferLedger;
use super::traits::{Clock, LedgerStore, LockScope};
use crate::types::{
    AccountId, LedgerError, MemberRole, Membership, MembershipStatus, NewPool, OwnerId, Pool,
    PoolId, PoolRecord, PoolStatus, Transfer, TransferRequest,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub struct PoolEngine<S> {
    store: Arc<S>,
    ledger: Arc<TransferLedger<S>>,
    calendar: LedgerCalendar,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> PoolEngine<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<TransferLedger<S>>,
        calendar: LedgerCalendar,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            calendar,
            clock,
        }
    }

    /// Create a pool with its creator as the owning member
    ///
    /// The creator's membership starts at zero contributed; creating a pool
    /// moves no money.
    pub fn create_pool(&self, request: NewPool) -> Result<Pool, LedgerError> {
        let now = self.clock.now();
        let today = self.calendar.today(now);

        if request.name.trim().is_empty() {
            return Err(LedgerError::validation("pool name must not be empty"));
        }
        if request.goal_amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                request.goal_amount,
                "goal must be positive",
            ));
        }
        if request.contribution_amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                request.contribution_amount,
                "contribution must be positive",
            ));
        }
        if request.max_members == 0 {
            return Err(LedgerError::validation("max_members must be at least 1"));
        }
        if request.start_date >= request.end_date {
            return Err(LedgerError::invalid_date_range(
                request.start_date,
                request.end_date,
                "start must precede end",
            ));
        }
        if request.start_date < today {
            return Err(LedgerError::invalid_date_range(
                request.start_date,
                request.end_date,
                "start must not be in the past",
            ));
        }

        let pool = Pool {
            pool_id: PoolId::generate(),
            creator_id: request.creator_id.clone(),
            name: request.name,
            goal_amount: request.goal_amount,
            current_amount: Decimal::ZERO,
            contribution_amount: request.contribution_amount,
            frequency: request.frequency,
            start_date: request.start_date,
            end_date: request.end_date,
            max_members: request.max_members,
            status: PoolStatus::Active,
            created_at: now,
        };
        let creator = Membership {
            pool_id: pool.pool_id.clone(),
            user_id: request.creator_id.clone(),
            role: MemberRole::Owner,
            contribution_amount: request.contribution_amount,
            total_contributed: Decimal::ZERO,
            status: MembershipStatus::Active,
            join_date: today,
        };
        let record = PoolRecord {
            pool: pool.clone(),
            members: BTreeMap::from([(request.creator_id.clone(), creator)]),
        };

        self.store
            .with_transaction(&LockScope::for_owner(&request.creator_id), |tx| {
                tx.insert_pool(record)
            })?;

        info!(pool_id = %pool.pool_id, creator = %pool.creator_id, goal = %pool.goal_amount, "pool created");
        Ok(pool)
    }

    /// Add `user_id` to a pool that has not started yet
    ///
    /// A user who left earlier may rejoin and keeps their contributed total.
    pub fn join_pool(
        &self,
        pool_id: &PoolId,
        user_id: &OwnerId,
        contribution_amount: Decimal,
    ) -> Result<Membership, LedgerError> {
        if contribution_amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                contribution_amount,
                "contribution must be positive",
            ));
        }
        let today = self.calendar.today(self.clock.now());
        let scope = LockScope::for_owner(user_id).with_pool(pool_id);

        let membership = self.store.with_transaction(&scope, |tx| {
            let record = tx.pool_mut(pool_id)?;
            if record.pool.status != PoolStatus::Active {
                return Err(LedgerError::pool_inactive(pool_id, record.pool.status));
            }
            if record.active_membership(user_id).is_some() {
                return Err(LedgerError::already_member(pool_id, user_id));
            }
            if record.active_member_count() >= record.pool.max_members as usize {
                return Err(LedgerError::pool_full(pool_id, record.pool.max_members));
            }
            if today >= record.pool.start_date {
                return Err(LedgerError::pool_already_started(
                    pool_id,
                    record.pool.start_date,
                ));
            }

            let membership = record
                .members
                .entry(user_id.clone())
                .or_insert_with(|| Membership {
                    pool_id: pool_id.clone(),
                    user_id: user_id.clone(),
                    role: MemberRole::Member,
                    contribution_amount,
                    total_contributed: Decimal::ZERO,
                    status: MembershipStatus::Active,
                    join_date: today,
                });
            membership.status = MembershipStatus::Active;
            membership.contribution_amount = contribution_amount;
            membership.join_date = today;
            Ok(membership.clone())
        })?;

        info!(pool_id = %pool_id, user = %user_id, "member joined pool");
        Ok(membership)
    }

    /// Contribute from one of the member's accounts into the pool
    pub fn contribute(
        &self,
        pool_id: &PoolId,
        user_id: &OwnerId,
        amount: Decimal,
        source_account_id: &AccountId,
        idempotency_key: Option<String>,
    ) -> Result<Transfer, LedgerError> {
        let mut request = TransferRequest::pool_contribution(
            user_id.clone(),
            source_account_id.clone(),
            pool_id.clone(),
            amount,
        );
        request.idempotency_key = idempotency_key;
        self.ledger.create_transfer(request)
    }

    /// Leave a pool before it starts
    ///
    /// Nothing is refunded; the membership keeps its contributed total.
    pub fn leave_pool(
        &self,
        pool_id: &PoolId,
        user_id: &OwnerId,
    ) -> Result<Membership, LedgerError> {
        let today = self.calendar.today(self.clock.now());
        let scope = LockScope::for_owner(user_id).with_pool(pool_id);

        let membership = self.store.with_transaction(&scope, |tx| {
            let record = tx.pool_mut(pool_id)?;
            let start_date = record.pool.start_date;
            let is_creator = &record.pool.creator_id == user_id;

            let membership = record
                .members
                .get_mut(user_id)
                .filter(|m| m.is_active())
                .ok_or_else(|| LedgerError::not_a_member(pool_id, user_id))?;
            if is_creator {
                return Err(LedgerError::creator_cannot_leave(pool_id, user_id));
            }
            if today >= start_date {
                return Err(LedgerError::pool_already_started(pool_id, start_date));
            }

            membership.status = MembershipStatus::Left;
            Ok(membership.clone())
        })?;

        info!(pool_id = %pool_id, user = %user_id, "member left pool");
        Ok(membership)
    }

    /// Cancel an active pool; only its creator may do so
    ///
    /// Contributed funds stay recorded in `current_amount`.
    pub fn cancel_pool(&self, pool_id: &PoolId, requester: &OwnerId) -> Result<Pool, LedgerError> {
        let scope = LockScope::for_owner(requester).with_pool(pool_id);

        let pool = self.store.with_transaction(&scope, |tx| {
            let record = tx.pool_mut(pool_id)?;
            if &record.pool.creator_id != requester {
                return Err(LedgerError::not_pool_creator(pool_id, requester));
            }
            if record.pool.status != PoolStatus::Active {
                return Err(LedgerError::pool_inactive(pool_id, record.pool.status));
            }
            record.pool.status = PoolStatus::Cancelled;
            Ok(record.pool.clone())
        })?;

        info!(pool_id = %pool_id, "pool cancelled");
        Ok(pool)
    }

    /// The pool and all of its memberships, including ones that left
    pub fn get_pool(&self, pool_id: &PoolId) -> Result<(Pool, Vec<Membership>), LedgerError> {
        let record = self
            .store
            .pool(pool_id)
            .ok_or_else(|| LedgerError::pool_not_found(pool_id))?;
        Ok((record.pool, record.members.into_values().collect()))
    }
}
