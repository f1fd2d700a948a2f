// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog item repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Record, Rows};
use crate::storage::row_store::{RowStore, RowStoreResult, Table};

/// Where an item's downloadable content lives.
///
/// The variant tag doubles as the item's download method, so an item can
/// never carry both uploaded files and an external link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "download_method", rename_all = "snake_case")]
pub enum ItemSource {
    /// Files in the `plugin-files` bucket, in display order (never empty).
    Upload { files: Vec<String> },
    /// Link to a third-party host.
    External { url: String },
}

impl ItemSource {
    /// Stored blob names, empty for external items.
    pub fn files(&self) -> &[String] {
        match self {
            ItemSource::Upload { files } => files,
            ItemSource::External { .. } => &[],
        }
    }

    /// Download method tag.
    pub fn method(&self) -> &'static str {
        match self {
            ItemSource::Upload { .. } => "upload",
            ItemSource::External { .. } => "external",
        }
    }
}

/// A downloadable plugin or mod listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Price in coins; zero means free.
    pub price_coins: u64,
    /// Blob name in the `logos` bucket.
    pub logo: Option<String>,
    pub source: ItemSource,
    pub version: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for CatalogItem {
    const TABLE: Table = Table::CatalogItems;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Repository for catalog rows.
pub struct CatalogRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> CatalogRepository<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    pub fn get(&self, item_id: &str) -> RowStoreResult<Option<CatalogItem>> {
        self.rows.get(item_id)
    }

    pub fn create(&self, item: &CatalogItem) -> RowStoreResult<()> {
        self.rows.insert(item)
    }

    /// Rewrite an item from its current stored state.
    ///
    /// Returns `(previous, stored)`, where `previous` is the row the winning
    /// swap replaced.
    pub fn update(
        &self,
        item_id: &str,
        apply: impl FnMut(&CatalogItem) -> CatalogItem,
    ) -> RowStoreResult<(CatalogItem, CatalogItem)> {
        self.rows.replace(item_id, apply)
    }

    pub fn delete(&self, item_id: &str) -> RowStoreResult<()> {
        self.rows.delete::<CatalogItem>(item_id)
    }

    /// All items, newest first.
    pub fn list(&self) -> RowStoreResult<Vec<CatalogItem>> {
        let mut items: Vec<CatalogItem> = self.rows.list()?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::testing::MemoryStore;
    use chrono::Duration;

    fn item(id: &str, age_minutes: i64) -> CatalogItem {
        let created = Utc::now() - Duration::minutes(age_minutes);
        CatalogItem {
            id: id.to_string(),
            title: format!("Plugin {id}"),
            description: "Adds things".to_string(),
            price_coins: 100,
            logo: None,
            source: ItemSource::Upload {
                files: vec!["a.jar".to_string()],
            },
            version: "1.20.4".to_string(),
            platform: "paper".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn source_serializes_with_method_tag() {
        let json = serde_json::to_value(ItemSource::External {
            url: "https://modrinth.com/x".to_string(),
        })
        .unwrap();
        assert_eq!(json["download_method"], "external");
        assert_eq!(json["url"], "https://modrinth.com/x");

        let parsed: ItemSource = serde_json::from_value(serde_json::json!({
            "download_method": "upload",
            "files": ["a.jar", "b.jar"]
        }))
        .unwrap();
        assert_eq!(parsed.files(), ["a.jar", "b.jar"]);
        assert_eq!(parsed.method(), "upload");
    }

    #[test]
    fn list_is_newest_first() {
        let store = MemoryStore::default();
        let repo = CatalogRepository::new(&store);
        repo.create(&item("old", 30)).unwrap();
        repo.create(&item("new", 1)).unwrap();
        repo.create(&item("mid", 10)).unwrap();

        let ids: Vec<String> = repo.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn update_and_delete() {
        let store = MemoryStore::default();
        let repo = CatalogRepository::new(&store);
        repo.create(&item("p1", 0)).unwrap();

        let (previous, stored) = repo
            .update("p1", |current| CatalogItem {
                price_coins: 0,
                ..current.clone()
            })
            .unwrap();
        assert_eq!(previous.price_coins, 100);
        assert_eq!(stored.price_coins, 0);
        assert_eq!(repo.get("p1").unwrap().unwrap().price_coins, 0);
        assert!(matches!(
            repo.update("missing", CatalogItem::clone),
            Err(crate::storage::RowStoreError::NotFound { .. })
        ));

        repo.delete("p1").unwrap();
        assert!(repo.get("p1").unwrap().is_none());
        assert!(repo.delete("p1").is_err());
    }
}
