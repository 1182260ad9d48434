//! Per-user token accounts and the store that holds them.
//!
//! The store hands out balances as snapshots. Mutation is only possible
//! through [`LockedAccounts`], which exists for the duration of one
//! transfer-engine unit of work.

use crate::amount::TokenAmount;
use crate::error::{LedgerError, Result};
use crate::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, RwLock};

/// A user's token balance.
///
/// # Invariants
///
/// - At most one account exists per `user_id`
/// - `balance` never drops below zero; debits that would overdraw are refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Owner of the account.
    pub user_id: UserId,

    /// Current token balance.
    pub balance: TokenAmount,

    pub created_at: DateTime<Utc>,

    /// Time of the last balance change.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Opens an account with the given starting balance.
    pub fn new(user_id: UserId, initial_balance: TokenAmount, now: DateTime<Utc>) -> Self {
        Account {
            user_id,
            balance: initial_balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the balance covers `amount`.
    pub fn can_cover(&self, amount: TokenAmount) -> bool {
        self.balance >= amount
    }

    /// Fails with `BalanceOverflow` if crediting `amount` would leave the
    /// representable range.
    pub fn can_absorb(&self, amount: TokenAmount) -> Result<()> {
        match self.balance.checked_add(amount) {
            Some(_) => Ok(()),
            None => Err(LedgerError::BalanceOverflow {
                user_id: self.user_id,
                balance: self.balance,
                amount,
            }),
        }
    }
}

/// Holds one [`Account`] per user.
///
/// Accounts live in a `BTreeMap` so that iterating and locking them always
/// happens in ascending `user_id` order.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: RwLock<BTreeMap<UserId, Mutex<Account>>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the user's account.
    pub fn get_balance(&self, user_id: UserId) -> Result<Account> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| LedgerError::poisoned("account store"))?;

        let slot = accounts
            .get(&user_id)
            .ok_or(LedgerError::AccountNotFound { user_id })?;
        let account = slot.lock().map_err(|_| LedgerError::poisoned("account"))?;
        Ok(account.clone())
    }

    /// Opens a new account. Fails if the user already has one.
    pub fn create_account(
        &self,
        user_id: UserId,
        initial_balance: TokenAmount,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        if initial_balance.is_negative() {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| LedgerError::poisoned("account store"))?;

        if accounts.contains_key(&user_id) {
            return Err(LedgerError::AccountExists { user_id });
        }

        let account = Account::new(user_id, initial_balance, now);
        accounts.insert(user_id, Mutex::new(account.clone()));
        Ok(account)
    }

    /// Snapshots of every account in ascending `user_id` order.
    pub fn snapshot(&self) -> Result<Vec<Account>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| LedgerError::poisoned("account store"))?;

        let snapshot = accounts
            .values()
            .map(|slot| {
                slot.lock()
                    .map(|account| account.clone())
                    .map_err(|_| LedgerError::poisoned("account"))
            })
            .collect();
        snapshot
    }

    /// Runs `work` with exclusive access to the given users' accounts.
    ///
    /// Locks are taken in ascending `user_id` order, so two units of work over
    /// overlapping users cannot deadlock. Users without an account are simply
    /// absent from the [`LockedAccounts`] handed to `work`. All locks are
    /// released when `work` returns.
    pub(crate) fn with_locked<T, F>(&self, user_ids: &[UserId], work: F) -> Result<T>
    where
        F: FnOnce(&mut LockedAccounts<'_>) -> Result<T>,
    {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| LedgerError::poisoned("account store"))?;

        let mut ordered = user_ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for user_id in ordered {
            if let Some(slot) = accounts.get(&user_id) {
                let guard = slot.lock().map_err(|_| LedgerError::poisoned("account"))?;
                guards.push((user_id, guard));
            }
        }

        let mut locked = LockedAccounts { guards };
        work(&mut locked)
    }
}

/// Accounts held exclusively by one unit of work.
pub(crate) struct LockedAccounts<'a> {
    guards: Vec<(UserId, MutexGuard<'a, Account>)>,
}

impl LockedAccounts<'_> {
    pub(crate) fn get(&self, user_id: UserId) -> Option<&Account> {
        self.guards
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, guard)| &**guard)
    }

    pub(crate) fn require(&self, user_id: UserId) -> Result<&Account> {
        self.get(user_id)
            .ok_or(LedgerError::AccountNotFound { user_id })
    }

    /// Applies a signed `delta` to the balance and returns the updated account.
    ///
    /// Does not check for overdraft; callers validate before adjusting. A
    /// result outside the representable range is refused and leaves the
    /// balance untouched.
    pub(crate) fn adjust_balance(
        &mut self,
        user_id: UserId,
        delta: TokenAmount,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let account = self
            .guards
            .iter_mut()
            .find(|(id, _)| *id == user_id)
            .map(|(_, guard)| &mut **guard)
            .ok_or(LedgerError::AccountNotFound { user_id })?;

        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow {
                user_id,
                balance: account.balance,
                amount: delta,
            })?;
        account.updated_at = now;
        Ok(account.clone())
    }
}
