// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the row store.
//!
//! Each repository provides CRUD operations for a specific record kind.
//! Rows are JSON documents; conditional updates compare the exact bytes
//! that were read, so a repository that re-serializes a loaded record must
//! keep the original bytes around as its swap token (see [`Versioned`]).

pub mod accounts;
pub mod catalog;
pub mod deposits;
pub mod feature_requests;
pub mod purchases;
pub mod settings;

pub use accounts::{Account, AccountRepository, BalanceError};
pub use catalog::{CatalogItem, CatalogRepository, ItemSource};
pub use deposits::{Deposit, DepositRepository, DepositStatus, PaymentMethod};
pub use feature_requests::{FeatureRequest, FeatureRequestRepository, RequestStatus};
pub use purchases::{Purchase, PurchaseRepository};
pub use settings::{Setting, SettingsRepository};

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::row_store::{RowStore, RowStoreError, RowStoreResult, Table};

/// Attempts a compare-and-swap loop makes before reporting contention.
pub const MAX_SWAP_ATTEMPTS: usize = 32;

/// Failure of a status change guarded by the row's current status.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError<S: fmt::Display + fmt::Debug> {
    /// The row was not in the status the caller expected.
    #[error("unexpected status {current}")]
    Conflict { current: S },

    #[error(transparent)]
    Store(#[from] RowStoreError),
}

/// A persisted record kind.
pub trait Record: Serialize + DeserializeOwned {
    /// Table the record lives in.
    const TABLE: Table;

    /// Row key.
    fn id(&self) -> &str;
}

/// A record together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    raw: Vec<u8>,
}

/// Shared typed helpers over a [`RowStore`].
#[derive(Clone, Copy)]
pub(crate) struct Rows<'a> {
    store: &'a dyn RowStore,
}

impl<'a> Rows<'a> {
    pub(crate) fn new(store: &'a dyn RowStore) -> Self {
        Self { store }
    }

    pub(crate) fn get<T: Record>(&self, id: &str) -> RowStoreResult<Option<T>> {
        Ok(self.load::<T>(id)?.map(|v| v.record))
    }

    pub(crate) fn load<T: Record>(&self, id: &str) -> RowStoreResult<Option<Versioned<T>>> {
        match self.store.get(T::TABLE, id)? {
            Some(raw) => Ok(Some(Versioned {
                record: serde_json::from_slice(&raw)?,
                raw,
            })),
            None => Ok(None),
        }
    }

    pub(crate) fn require<T: Record>(&self, id: &str) -> RowStoreResult<Versioned<T>> {
        self.load(id)?.ok_or_else(|| RowStoreError::NotFound {
            table: T::TABLE,
            id: id.to_string(),
        })
    }

    pub(crate) fn list<T: Record>(&self) -> RowStoreResult<Vec<T>> {
        self.store
            .scan(T::TABLE)?
            .into_iter()
            .map(|(_, raw)| serde_json::from_slice(&raw).map_err(RowStoreError::from))
            .collect()
    }

    pub(crate) fn insert<T: Record>(&self, record: &T) -> RowStoreResult<()> {
        self.store
            .insert(T::TABLE, record.id(), &serde_json::to_vec(record)?)
    }

    pub(crate) fn update<T: Record>(&self, record: &T) -> RowStoreResult<()> {
        self.store
            .update(T::TABLE, record.id(), &serde_json::to_vec(record)?)
    }

    pub(crate) fn put<T: Record>(&self, record: &T) -> RowStoreResult<()> {
        self.store.put(T::TABLE, record.id(), &serde_json::to_vec(record)?)
    }

    pub(crate) fn delete<T: Record>(&self, id: &str) -> RowStoreResult<()> {
        self.store.delete(T::TABLE, id)
    }

    /// Write `next` only if the row still holds the bytes in `current`.
    pub(crate) fn swap<T: Record>(&self, current: &Versioned<T>, next: &T) -> RowStoreResult<bool> {
        self.store.compare_and_swap(
            T::TABLE,
            next.id(),
            &current.raw,
            &serde_json::to_vec(next)?,
        )
    }

    /// Read-modify-write loop that always writes.
    ///
    /// Returns the record the winning swap replaced together with the one it
    /// stored. `apply` may run several times and must not have side effects.
    pub(crate) fn replace<T: Record>(
        &self,
        id: &str,
        mut apply: impl FnMut(&T) -> T,
    ) -> RowStoreResult<(T, T)> {
        for _ in 0..MAX_SWAP_ATTEMPTS {
            let current = self.require::<T>(id)?;
            let next = apply(&current.record);
            if self.swap(&current, &next)? {
                return Ok((current.record, next));
            }
            std::thread::yield_now();
        }

        Err(RowStoreError::Contention {
            table: T::TABLE,
            id: id.to_string(),
        })
    }

    /// Read-modify-write loop.
    ///
    /// `apply` sees the current record and returns the replacement, or
    /// `None` to leave the row as it is. It may run several times; it must
    /// not have side effects. Returns the record as stored afterwards.
    pub(crate) fn modify<T, E>(
        &self,
        id: &str,
        mut apply: impl FnMut(&T) -> Result<Option<T>, E>,
    ) -> Result<T, E>
    where
        T: Record,
        E: From<RowStoreError>,
    {
        for _ in 0..MAX_SWAP_ATTEMPTS {
            let current = self.require::<T>(id)?;
            let Some(next) = apply(&current.record)? else {
                return Ok(current.record);
            };
            if self.swap(&current, &next)? {
                return Ok(next);
            }
            std::thread::yield_now();
        }

        Err(RowStoreError::Contention {
            table: T::TABLE,
            id: id.to_string(),
        }
        .into())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: u32,
    }

    impl Record for Counter {
        const TABLE: Table = Table::Settings;

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn counter(value: u32) -> Counter {
        Counter {
            id: "c".to_string(),
            value,
        }
    }

    #[test]
    fn stale_swap_is_refused() {
        let store = MemoryStore::default();
        let rows = Rows::new(&store);
        rows.insert(&counter(1)).unwrap();

        let first = rows.require::<Counter>("c").unwrap();
        let second = rows.require::<Counter>("c").unwrap();
        assert!(rows.swap(&first, &counter(2)).unwrap());
        assert!(!rows.swap(&second, &counter(3)).unwrap());
        assert_eq!(rows.get::<Counter>("c").unwrap(), Some(counter(2)));
    }

    #[test]
    fn modify_applies_and_can_skip() {
        let store = MemoryStore::default();
        let rows = Rows::new(&store);
        rows.insert(&counter(1)).unwrap();

        let updated: Counter = rows
            .modify("c", |c: &Counter| {
                Ok::<_, RowStoreError>(Some(counter(c.value + 1)))
            })
            .unwrap();
        assert_eq!(updated.value, 2);

        let unchanged: Counter = rows
            .modify("c", |_: &Counter| Ok::<_, RowStoreError>(None))
            .unwrap();
        assert_eq!(unchanged.value, 2);

        let missing = rows.modify("nope", |_: &Counter| Ok::<_, RowStoreError>(None));
        assert!(matches!(missing, Err(RowStoreError::NotFound { .. })));
    }

    #[test]
    fn modify_reports_contention_when_always_losing() {
        let store = MemoryStore::default();
        let rows = Rows::new(&store);
        rows.insert(&counter(0)).unwrap();

        // Every attempt races a writer that bumps the row first.
        let result = rows.modify("c", |c: &Counter| {
            rows.put(&counter(c.value + 100))?;
            Ok::<_, RowStoreError>(Some(counter(c.value + 1)))
        });
        assert!(matches!(result, Err(RowStoreError::Contention { .. })));
    }
}
