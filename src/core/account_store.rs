use super::traits::{Clock, LedgerStore, LockScope};
use crate::types::{Account, AccountId, AccountStatus, BalanceReason, LedgerError, OwnerId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Apply a signed balance change to a locked account
///
/// Shared by the account store, the transfer ledger and the accrual job so the
/// balance rules live in one place. Returns the new balance.
///
/// # Rules
///
/// - Inactive accounts reject every change except `Reversal`, which returns
///   money that left the account before it was deactivated
/// - A debit may never take the balance below zero
/// - `Interest` credits also increase `interest_earned`
pub fn apply_adjustment(
    account: &mut Account,
    delta: Decimal,
    reason: BalanceReason,
) -> Result<Decimal, LedgerError> {
    if !account.is_active() && reason != BalanceReason::Reversal {
        return Err(LedgerError::account_inactive(&account.account_id));
    }

    if delta < Decimal::ZERO && account.balance + delta < Decimal::ZERO {
        return Err(LedgerError::insufficient_funds(
            &account.account_id,
            account.balance,
            -delta,
        ));
    }

    let balance = account
        .balance
        .checked_add(delta)
        .ok_or_else(|| LedgerError::arithmetic_overflow(reason.as_str()))?;

    if reason == BalanceReason::Interest {
        account.interest_earned = account
            .interest_earned
            .checked_add(delta)
            .ok_or_else(|| LedgerError::arithmetic_overflow("interest"))?;
    }

    account.balance = balance;
    Ok(balance)
}

/// Account identity, balances and status
///
/// Every read-modify-write runs inside a store transaction that holds the
/// account's lock.
pub struct AccountStore<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> AccountStore<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an active account with a zero balance
    pub fn open_account(
        &self,
        account_id: AccountId,
        owner_id: OwnerId,
    ) -> Result<Account, LedgerError> {
        let account = Account::new(account_id, owner_id, self.clock.now());
        self.store.insert_account(account.clone())?;
        info!(account = %account.account_id, owner = %account.owner_id, "account opened");
        Ok(account)
    }

    pub fn get_account(&self, account_id: &AccountId) -> Result<Account, LedgerError> {
        self.store
            .account(account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    pub fn get_balance(&self, account_id: &AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.get_account(account_id)?.balance)
    }

    /// Apply a signed delta and return the new balance
    pub fn adjust_balance(
        &self,
        account_id: &AccountId,
        delta: Decimal,
        reason: BalanceReason,
    ) -> Result<Decimal, LedgerError> {
        let scope = LockScope::new().with_account(account_id);
        let balance = self.store.with_transaction(&scope, |tx| {
            apply_adjustment(tx.account_mut(account_id)?, delta, reason)
        })?;
        debug!(account = %account_id, %delta, %reason, %balance, "balance adjusted");
        Ok(balance)
    }

    pub fn deactivate_account(&self, account_id: &AccountId) -> Result<Account, LedgerError> {
        self.set_status(account_id, AccountStatus::Inactive)
    }

    pub fn reactivate_account(&self, account_id: &AccountId) -> Result<Account, LedgerError> {
        self.set_status(account_id, AccountStatus::Active)
    }

    /// All accounts sorted by id
    pub fn list_accounts(&self) -> Vec<Account> {
        self.store.accounts()
    }

    fn set_status(
        &self,
        account_id: &AccountId,
        status: AccountStatus,
    ) -> Result<Account, LedgerError> {
        let scope = LockScope::new().with_account(account_id);
        let account = self.store.with_transaction(&scope, |tx| {
            let account = tx.account_mut(account_id)?;
            account.status = status;
            Ok(account.clone())
        })?;
        info!(account = %account_id, %status, "account status changed");
        Ok(account)
    }
}
