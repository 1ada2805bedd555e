//! Daily float and interest accrual
//!
//! For one calendar date the job credits each eligible account with a day of
//! user interest and records the platform's revenue on the float spread:
//!
//! ```text
//! user interest     = balance × user_rate / days_in_year
//! platform revenue  = Σ balances × (float_rate − user_rate) / days_in_year
//! ```
//!
//! Amounts are rounded to `amount_scale` places with banker's rounding.
//!
//! # Idempotency
//!
//! Each account is credited in its own transaction keyed by
//! `(account_id, date)`, and the global revenue record for the date is written
//! last. A run interrupted halfway is finished by the next run without
//! crediting anyone twice; once the revenue record exists the date is closed.

use super::account_store::apply_adjustment;
use super::traits::{LedgerStore, LockScope};
use crate::config::AccrualConfig;
use crate::types::{
    Account, AccountId, AccrualSummary, BalanceReason, DailyAccrualRecord, InterestRecord,
    LedgerError,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, info};

/// Result of crediting one account for one date
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CreditOutcome {
    Credited(InterestRecord),
    /// An earlier run already credited this account for the date
    AlreadyCredited(InterestRecord),
    Ineligible,
}

pub struct AccrualJob<S> {
    store: Arc<S>,
    config: AccrualConfig,
    run_lock: Mutex<()>,
}

impl<S: LedgerStore> AccrualJob<S> {
    pub fn new(store: Arc<S>, config: AccrualConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            run_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    pub fn user_daily_rate(&self) -> Decimal {
        self.config.user_rate / Decimal::from(self.config.days_in_year)
    }

    pub fn platform_daily_rate(&self) -> Decimal {
        (self.config.float_rate - self.config.user_rate) / Decimal::from(self.config.days_in_year)
    }

    /// Accrue interest and platform revenue for `date`
    ///
    /// Fails with `ConcurrencyConflict` while another run is in progress.
    /// Re-running a completed date returns its stored summary unchanged.
    pub fn run_daily_accrual(&self, date: NaiveDate) -> Result<AccrualSummary, LedgerError> {
        let _running = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(LedgerError::concurrency_conflict(format!(
                    "accrual for {} is already running",
                    date
                )))
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if let Some(revenue) = self.store.revenue_record(date) {
            debug!(%date, "accrual already complete");
            return Ok(AccrualSummary {
                user_interest_count: self.store.interest_records_for(date).len(),
                revenue,
                credited_this_run: 0,
            });
        }

        // Cumulative revenue chains forward, so a closed later date fixes the past
        if let Some(latest) = self.store.latest_revenue_before(NaiveDate::MAX) {
            if latest.date > date {
                return Err(LedgerError::validation(format!(
                    "accrual for {} is before the last closed date {}",
                    date, latest.date
                )));
            }
        }

        let mut total_balance = Decimal::ZERO;
        let mut eligible_accounts = 0;
        let mut credited_this_run = 0;

        for account in self.store.accounts() {
            let snapshot = match self.credit_account(&account.account_id, date)? {
                CreditOutcome::Credited(record) => {
                    credited_this_run += 1;
                    record.balance_snapshot
                }
                CreditOutcome::AlreadyCredited(record) => record.balance_snapshot,
                CreditOutcome::Ineligible => continue,
            };
            eligible_accounts += 1;
            total_balance = total_balance
                .checked_add(snapshot)
                .ok_or_else(|| LedgerError::arithmetic_overflow("accrual total"))?;
        }

        let rate = self.platform_daily_rate();
        let amount = self.round(
            total_balance
                .checked_mul(rate)
                .ok_or_else(|| LedgerError::arithmetic_overflow("platform revenue"))?,
        );
        let previous = self
            .store
            .latest_revenue_before(date)
            .map(|r| r.cumulative_amount)
            .unwrap_or(Decimal::ZERO);
        let cumulative_amount = previous
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("cumulative revenue"))?;
        let revenue = DailyAccrualRecord {
            date,
            total_balance,
            rate,
            amount,
            cumulative_amount,
            eligible_accounts,
        };

        self.store.with_transaction(&LockScope::new(), |tx| {
            tx.insert_revenue_record(revenue.clone())
        })?;

        info!(
            %date,
            eligible_accounts,
            credited_this_run,
            total_balance = %revenue.total_balance,
            revenue = %revenue.amount,
            cumulative = %revenue.cumulative_amount,
            "daily accrual complete"
        );

        Ok(AccrualSummary {
            revenue,
            user_interest_count: eligible_accounts,
            credited_this_run,
        })
    }

    /// Credit one account's interest for `date` unless already done
    pub(crate) fn credit_account(
        &self,
        account_id: &AccountId,
        date: NaiveDate,
    ) -> Result<CreditOutcome, LedgerError> {
        let rate = self.user_daily_rate();
        let scope = LockScope::new().with_account(account_id);

        self.store.with_transaction(&scope, |tx| {
            if let Some(existing) = tx.interest_record(account_id, date) {
                return Ok(CreditOutcome::AlreadyCredited(existing));
            }

            let account = tx.account_mut(account_id)?;
            if !self.is_eligible(account) {
                return Ok(CreditOutcome::Ineligible);
            }

            let balance_snapshot = account.balance;
            let amount = self.round(
                balance_snapshot
                    .checked_mul(rate)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("interest"))?,
            );
            apply_adjustment(account, amount, BalanceReason::Interest)?;
            account.last_interest_date = Some(
                account
                    .last_interest_date
                    .map_or(date, |last| last.max(date)),
            );

            let record = InterestRecord {
                account_id: account_id.clone(),
                owner_id: account.owner_id.clone(),
                date,
                balance_snapshot,
                rate,
                amount,
                cumulative_amount: account.interest_earned,
            };
            tx.insert_interest_record(record.clone())?;
            Ok(CreditOutcome::Credited(record))
        })
    }

    fn is_eligible(&self, account: &Account) -> bool {
        account.is_active()
            && account.balance > Decimal::ZERO
            && account.balance >= self.config.minimum_for_interest
    }

    fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(
            self.config.amount_scale,
            RoundingStrategy::MidpointNearestEven,
        )
    }
}
