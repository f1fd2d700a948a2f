// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Purchase repository.
//!
//! A purchase is keyed by `{account_id}:{item_id}`, so the store's insert
//! uniqueness is what guarantees at most one purchase per account and item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Record, Rows};
use crate::storage::row_store::{RowStore, RowStoreError, RowStoreResult, Table};

/// Permanent record that an account may download an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purchase {
    pub id: String,
    pub account_id: String,
    pub item_id: String,
    /// Coins debited at settlement.
    pub price_coins: u64,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn new(account_id: &str, item_id: &str, price_coins: u64) -> Self {
        Self {
            id: Self::key(account_id, item_id),
            account_id: account_id.to_string(),
            item_id: item_id.to_string(),
            price_coins,
            created_at: Utc::now(),
        }
    }

    /// Row key for an (account, item) pair.
    pub fn key(account_id: &str, item_id: &str) -> String {
        format!("{account_id}:{item_id}")
    }
}

impl Record for Purchase {
    const TABLE: Table = Table::Purchases;

    fn id(&self) -> &str {
        &self.id
    }
}

impl crate::storage::OwnedResource for Purchase {
    fn owner_account_id(&self) -> &str {
        &self.account_id
    }
}

/// Repository for purchase rows.
pub struct PurchaseRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> PurchaseRepository<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    /// Look up the purchase for an (account, item) pair.
    pub fn find(&self, account_id: &str, item_id: &str) -> RowStoreResult<Option<Purchase>> {
        self.rows.get(&Purchase::key(account_id, item_id))
    }

    /// Record a purchase. Fails with `AlreadyExists` if the pair is owned.
    pub fn create(&self, purchase: &Purchase) -> RowStoreResult<()> {
        self.rows.insert(purchase)
    }

    /// Purchases of one account, newest first.
    pub fn list_by_account(&self, account_id: &str) -> RowStoreResult<Vec<Purchase>> {
        let mut purchases: Vec<Purchase> = self
            .rows
            .list::<Purchase>()?
            .into_iter()
            .filter(|p| p.account_id == account_id)
            .collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    /// All purchases (admin view).
    pub fn list_all(&self) -> RowStoreResult<Vec<Purchase>> {
        self.rows.list()
    }

    /// Remove every purchase of an item.
    ///
    /// Keeps going past individual failures and returns the ids that could
    /// not be deleted.
    pub fn delete_for_item(&self, item_id: &str) -> RowStoreResult<Vec<String>> {
        let mut failed = Vec::new();
        for purchase in self.rows.list::<Purchase>()? {
            if purchase.item_id != item_id {
                continue;
            }
            match self.rows.delete::<Purchase>(&purchase.id) {
                Ok(()) | Err(RowStoreError::NotFound { .. }) => {}
                Err(error) => {
                    tracing::warn!(purchase_id = %purchase.id, %error, "failed to delete purchase");
                    failed.push(purchase.id);
                }
            }
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::testing::MemoryStore;

    #[test]
    fn pair_is_unique() {
        let store = MemoryStore::default();
        let repo = PurchaseRepository::new(&store);

        repo.create(&Purchase::new("user_1", "item_1", 300)).unwrap();
        let err = repo
            .create(&Purchase::new("user_1", "item_1", 300))
            .unwrap_err();
        assert!(matches!(err, RowStoreError::AlreadyExists { .. }));

        repo.create(&Purchase::new("user_2", "item_1", 300)).unwrap();
        assert!(repo.find("user_1", "item_1").unwrap().is_some());
        assert!(repo.find("user_1", "item_2").unwrap().is_none());
    }

    #[test]
    fn list_and_cascade() {
        let store = MemoryStore::default();
        let repo = PurchaseRepository::new(&store);
        repo.create(&Purchase::new("user_1", "item_1", 1)).unwrap();
        repo.create(&Purchase::new("user_1", "item_2", 2)).unwrap();
        repo.create(&Purchase::new("user_2", "item_1", 1)).unwrap();

        assert_eq!(repo.list_by_account("user_1").unwrap().len(), 2);

        let failed = repo.delete_for_item("item_1").unwrap();
        assert!(failed.is_empty());
        let remaining = repo.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].item_id, "item_2");
    }
}
