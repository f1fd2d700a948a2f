// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Row store backed by an embedded redb database (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! One redb table per [`Table`], each mapping `id → JSON bytes`:
//!
//! - `accounts`: account_id → Account
//! - `catalog_items`: item_id → CatalogItem
//! - `purchases`: `{account_id}:{item_id}` → Purchase
//! - `deposits`: deposit_id → Deposit
//! - `feature_requests`: request_id → FeatureRequest
//! - `settings`: key → Setting
//!
//! redb serializes write transactions, so a read-compare-write performed
//! inside one write transaction is atomic for that row.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::row_store::{RowStore, RowStoreError, RowStoreResult, Table};

fn definition(table: Table) -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(table.name())
}

macro_rules! backend_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for RowStoreError {
                fn from(e: $ty) -> Self {
                    RowStoreError::Backend(e.to_string())
                }
            }
        )*
    };
}

backend_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Embedded ACID row store.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> RowStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RowStoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        for table in Table::ALL {
            let _ = write_txn.open_table(definition(table))?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl RowStore for RedbStore {
    fn get(&self, table: Table, id: &str) -> RowStoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(definition(table))?;
        Ok(rows.get(id)?.map(|guard| guard.value().to_vec()))
    }

    fn scan(&self, table: Table) -> RowStoreResult<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(definition(table))?;
        let mut out = Vec::new();
        for entry in rows.iter()? {
            let (key, value) = entry?;
            out.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(out)
    }

    fn insert(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(definition(table))?;
            if rows.get(id)?.is_some() {
                return Err(RowStoreError::AlreadyExists {
                    table,
                    id: id.to_string(),
                });
            }
            rows.insert(id, row)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(definition(table))?;
            if rows.get(id)?.is_none() {
                return Err(RowStoreError::NotFound {
                    table,
                    id: id.to_string(),
                });
            }
            rows.insert(id, row)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put(&self, table: Table, id: &str, row: &[u8]) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(definition(table))?;
            rows.insert(id, row)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, table: Table, id: &str) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(definition(table))?;
            if rows.remove(id)?.is_none() {
                return Err(RowStoreError::NotFound {
                    table,
                    id: id.to_string(),
                });
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn compare_and_swap(
        &self,
        table: Table,
        id: &str,
        expected: &[u8],
        row: &[u8],
    ) -> RowStoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let swapped = {
            let mut rows = write_txn.open_table(definition(table))?;
            let current = rows.get(id)?.map(|guard| guard.value().to_vec());
            match current {
                None => {
                    return Err(RowStoreError::NotFound {
                        table,
                        id: id.to_string(),
                    })
                }
                Some(current) if current != expected => false,
                Some(_) => {
                    rows.insert(id, row)?;
                    true
                }
            }
        };

        if swapped {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(swapped)
    }
}
