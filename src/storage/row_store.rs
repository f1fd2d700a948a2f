// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic row store contract.
//!
//! Rows are opaque byte strings (JSON produced by the repository layer)
//! addressed by `(table, id)`. The contract deliberately offers no
//! multi-row transaction. The only atomic primitive is
//! [`RowStore::compare_and_swap`], which replaces a single row if and only
//! if its current bytes equal the bytes the caller last read.

use std::fmt;

/// Record kinds persisted by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Accounts,
    CatalogItems,
    Purchases,
    Deposits,
    FeatureRequests,
    Settings,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Table; 6] = [
        Table::Accounts,
        Table::CatalogItems,
        Table::Purchases,
        Table::Deposits,
        Table::FeatureRequests,
        Table::Settings,
    ];

    /// Stable storage name of the table.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::CatalogItems => "catalog_items",
            Table::Purchases => "purchases",
            Table::Deposits => "deposits",
            Table::FeatureRequests => "feature_requests",
            Table::Settings => "settings",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors surfaced by a row store backend.
#[derive(Debug, thiserror::Error)]
pub enum RowStoreError {
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: String },

    #[error("{table} row {id} already exists")]
    AlreadyExists { table: Table, id: String },

    /// A compare-and-swap loop kept losing to concurrent writers.
    #[error("{table} row {id} is under contention")]
    Contention { table: Table, id: String },

    #[error("row store backend error: {0}")]
    Backend(String),

    #[error("row serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RowStoreResult<T> = Result<T, RowStoreError>;

/// Persistent keyed row storage.
///
/// Implementations must make every single-row method atomic. Nothing is
/// promised across rows.
pub trait RowStore: Send + Sync {
    /// Point lookup.
    fn get(&self, table: Table, id: &str) -> RowStoreResult<Option<Vec<u8>>>;

    /// Full scan of a table as `(id, row)` pairs in key order.
    fn scan(&self, table: Table) -> RowStoreResult<Vec<(String, Vec<u8>)>>;

    /// Insert a new row. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()>;

    /// Replace an existing row. Fails with `NotFound` if absent.
    fn update(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()>;

    /// Insert or replace (last write wins).
    fn put(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()>;

    /// Delete a row. Fails with `NotFound` if absent.
    fn delete(&self, table: Table, id: &str) -> RowStoreResult<()>;

    /// Replace the row only if its stored bytes still equal `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first, and
    /// `NotFound` when the row no longer exists.
    fn compare_and_swap(
        &self,
        table: Table,
        id: &str,
        expected: &[u8],
        row: &[u8],
    ) -> RowStoreResult<bool>;
}
