// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settings repository (plain key/value rows, last write wins).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Record, Rows};
use crate::storage::row_store::{RowStore, RowStoreError, RowStoreResult, Table};

/// A persisted setting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
    /// Admin who last wrote the value.
    pub updated_by: Option<String>,
}

impl Record for Setting {
    const TABLE: Table = Table::Settings;

    fn id(&self) -> &str {
        &self.key
    }
}

/// Repository for settings rows.
pub struct SettingsRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    pub fn get(&self, key: &str) -> RowStoreResult<Option<Setting>> {
        self.rows.get(key)
    }

    /// Value of a key, if set.
    pub fn value(&self, key: &str) -> RowStoreResult<Option<String>> {
        Ok(self.get(key)?.map(|s| s.value))
    }

    /// All settings in key order.
    pub fn list(&self) -> RowStoreResult<Vec<Setting>> {
        self.rows.list()
    }

    /// Write a value, replacing any previous one.
    pub fn set(&self, key: &str, value: &str, updated_by: Option<&str>) -> RowStoreResult<Setting> {
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
            updated_by: updated_by.map(str::to_string),
        };
        self.rows.put(&setting)?;
        Ok(setting)
    }

    /// Remove a key. Removing an unset key is not an error.
    pub fn remove(&self, key: &str) -> RowStoreResult<()> {
        match self.rows.delete::<Setting>(key) {
            Ok(()) | Err(RowStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
