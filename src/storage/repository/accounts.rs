// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! The account row is the only contended record in the marketplace. Every
//! balance change goes through a compare-and-swap on that row, so two
//! settlements against the same account can never both spend the same
//! coins.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Record, Rows};
use crate::storage::row_store::{RowStore, RowStoreError, RowStoreResult, Table};

/// Coin balance holder, keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    /// Coins available to spend.
    pub balance: u64,
    /// Deposits already credited to this account.
    #[serde(default)]
    pub applied_deposits: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            balance: 0,
            applied_deposits: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Account {
    const TABLE: Table = Table::Accounts;

    fn id(&self) -> &str {
        &self.id
    }
}

impl crate::storage::OwnedResource for Account {
    fn owner_account_id(&self) -> &str {
        &self.id
    }
}

/// Balance mutation failures.
#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("insufficient funds: {required} required, {current} available")]
    InsufficientFunds { required: u64, current: u64 },

    #[error("balance of account {account_id} would overflow")]
    Overflow { account_id: String },

    #[error(transparent)]
    Store(#[from] RowStoreError),
}

/// Repository for account rows.
pub struct AccountRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> AccountRepository<'a> {
    /// Create a new AccountRepository.
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    /// Get an account by id.
    pub fn get(&self, account_id: &str) -> RowStoreResult<Option<Account>> {
        self.rows.get(account_id)
    }

    /// Get the account, creating it with a zero balance on first sight.
    ///
    /// Returns the account and whether this call created it.
    pub fn open(&self, account_id: &str) -> RowStoreResult<(Account, bool)> {
        if let Some(account) = self.get(account_id)? {
            return Ok((account, false));
        }

        let account = Account::new(account_id);
        match self.rows.insert(&account) {
            Ok(()) => Ok((account, true)),
            // Lost a race with a concurrent open of the same account.
            Err(RowStoreError::AlreadyExists { .. }) => {
                let existing = self.rows.require::<Account>(account_id)?;
                Ok((existing.record, false))
            }
            Err(e) => Err(e),
        }
    }

    /// List all accounts (admin view).
    pub fn list_all(&self) -> RowStoreResult<Vec<Account>> {
        self.rows.list()
    }

    /// Credit the coins of a deposit.
    ///
    /// Idempotent per `deposit_id`: if the deposit was already applied the
    /// account is returned unchanged.
    pub fn credit_deposit(
        &self,
        account_id: &str,
        amount: u64,
        deposit_id: &str,
    ) -> Result<Account, BalanceError> {
        self.rows.modify(account_id, |account: &Account| {
            if account.applied_deposits.contains(deposit_id) {
                return Ok(None);
            }
            let mut next = account.clone();
            next.balance = add(account, amount)?;
            next.applied_deposits.insert(deposit_id.to_string());
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
    }

    /// Drop the credit marker of a deposit that has reached `approved`.
    ///
    /// Only `crediting` deposits are ever credited again, so the marker has
    /// no use once the deposit is terminal.
    pub fn release_deposit(&self, account_id: &str, deposit_id: &str) -> RowStoreResult<Account> {
        self.rows.modify(account_id, |account: &Account| {
            if !account.applied_deposits.contains(deposit_id) {
                return Ok(None);
            }
            let mut next = account.clone();
            next.applied_deposits.remove(deposit_id);
            Ok(Some(next))
        })
    }

    /// Give back coins taken by [`AccountRepository::debit`].
    ///
    /// Adds to whatever the balance is now instead of restoring an earlier
    /// snapshot, so concurrent changes are kept.
    pub fn refund(&self, account_id: &str, amount: u64) -> Result<Account, BalanceError> {
        self.rows.modify(account_id, |account: &Account| {
            let mut next = account.clone();
            next.balance = add(account, amount)?;
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
    }

    /// Take coins from the balance.
    ///
    /// The funds check runs against the exact row being swapped.
    pub fn debit(&self, account_id: &str, amount: u64) -> Result<Account, BalanceError> {
        self.rows.modify(account_id, |account: &Account| {
            let balance =
                account
                    .balance
                    .checked_sub(amount)
                    .ok_or(BalanceError::InsufficientFunds {
                        required: amount,
                        current: account.balance,
                    })?;
            let mut next = account.clone();
            next.balance = balance;
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
    }
}

fn add(account: &Account, amount: u64) -> Result<u64, BalanceError> {
    account
        .balance
        .checked_add(amount)
        .ok_or_else(|| BalanceError::Overflow {
            account_id: account.id.clone(),
        })
}
