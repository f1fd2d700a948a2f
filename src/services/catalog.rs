// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog management (admin) and catalog reads (public).
//!
//! Blobs are always written before the row that references them and
//! removed only after the row stops referencing them. A failed write can
//! leave an orphaned blob, never a row pointing at a missing one.

use chrono::Utc;

use super::{discard_blobs, required_text, Backends, MarketError, MarketResult, Upload};
use crate::audit_log;
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_admin, generate_blob_name, AuditEvent, AuditEventType, BlobStore, Bucket, CatalogItem,
    CatalogRepository, ItemSource, PurchaseRepository, RowStoreError,
};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_TAG_LEN: usize = 64;

/// Input for a new catalog item.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub price_coins: i64,
    pub version: String,
    pub platform: String,
    pub logo: Option<Upload>,
    /// Plugin files in display order. Mutually exclusive with `external_url`.
    pub files: Vec<Upload>,
    pub external_url: Option<String>,
}

/// Partial update; `None` / empty fields keep the current value.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_coins: Option<i64>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub logo: Option<Upload>,
    /// Replaces every current file when non-empty.
    pub files: Vec<Upload>,
    /// Switches the item to an external link.
    pub external_url: Option<String>,
}

/// Content source requested by a create or update, before any upload.
enum SourceDraft<'u> {
    Files(&'u [Upload]),
    External(String),
}

impl<'u> SourceDraft<'u> {
    /// Exactly one of files and URL; `None` when neither was given.
    fn from_parts(files: &'u [Upload], external_url: Option<&str>) -> MarketResult<Option<Self>> {
        let url = external_url.map(str::trim).filter(|url| !url.is_empty());
        match (files.is_empty(), url) {
            (false, Some(_)) => Err(MarketError::validation(
                "provide either plugin files or an external URL, not both",
            )),
            (false, None) => {
                for file in files {
                    file.ensure_not_empty("plugin file")?;
                }
                Ok(Some(SourceDraft::Files(files)))
            }
            (true, Some(url)) => Ok(Some(SourceDraft::External(validate_external_url(url)?))),
            (true, None) => Ok(None),
        }
    }
}

fn validate_external_url(raw: &str) -> MarketResult<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| MarketError::validation(format!("external URL is invalid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(MarketError::validation(
            "external URL must be an http or https link",
        ));
    }
    Ok(raw.to_string())
}

fn validate_price(price_coins: i64) -> MarketResult<u64> {
    u64::try_from(price_coins)
        .map_err(|_| MarketError::validation("price must be zero or a positive number of coins"))
}

fn optional_text(field: &str, value: &str, max_len: usize) -> MarketResult<String> {
    let value = value.trim();
    if value.chars().count() > max_len {
        return Err(MarketError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Blobs written during one operation, removed again if it fails.
#[derive(Default)]
struct StagedBlobs {
    logo: Option<String>,
    files: Vec<String>,
}

impl StagedBlobs {
    fn discard(&self, blobs: &dyn BlobStore) -> Option<String> {
        let notes: Vec<String> = [
            discard_blobs(blobs, Bucket::Logos, self.logo.as_slice()),
            discard_blobs(blobs, Bucket::PluginFiles, &self.files),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!notes.is_empty()).then(|| notes.join("; "))
    }
}

/// Catalog operations.
pub struct CatalogService<'a> {
    backends: Backends<'a>,
}

impl<'a> CatalogService<'a> {
    pub fn new(backends: Backends<'a>) -> Self {
        Self { backends }
    }

    fn items(&self) -> CatalogRepository<'a> {
        CatalogRepository::new(self.backends.rows)
    }

    /// All items, newest first.
    pub fn list(&self) -> MarketResult<Vec<CatalogItem>> {
        Ok(self.items().list()?)
    }

    pub fn get(&self, item_id: &str) -> MarketResult<CatalogItem> {
        self.items()
            .get(item_id)?
            .ok_or_else(|| MarketError::not_found("catalog item", item_id))
    }

    /// Public URL of the item's logo.
    pub fn logo_url(&self, item: &CatalogItem) -> Option<String> {
        item.logo
            .as_deref()
            .map(|logo| self.backends.blobs.public_url(Bucket::Logos, logo))
    }

    /// Create a listing (admin only).
    pub fn create(&self, caller: &AuthenticatedUser, new: NewItem) -> MarketResult<CatalogItem> {
        ensure_admin(caller, "creating a catalog item")?;

        let title = required_text("title", &new.title, MAX_TITLE_LEN)?;
        let description = optional_text("description", &new.description, MAX_DESCRIPTION_LEN)?;
        let version = required_text("version", &new.version, MAX_TAG_LEN)?;
        let platform = required_text("platform", &new.platform, MAX_TAG_LEN)?;
        let price_coins = validate_price(new.price_coins)?;
        if let Some(logo) = &new.logo {
            logo.ensure_image("logo")?;
        }
        let draft = SourceDraft::from_parts(&new.files, new.external_url.as_deref())?
            .ok_or_else(|| {
                MarketError::validation("an item needs plugin files or an external URL")
            })?;

        let mut staged = StagedBlobs::default();
        let uploaded = self
            .stage_logo(new.logo.as_ref(), &mut staged)
            .and_then(|logo| Ok((logo, self.stage_source(draft, &mut staged)?)));
        let (logo, source) = match uploaded {
            Ok(uploaded) => uploaded,
            Err(error) => {
                staged.discard(self.backends.blobs);
                return Err(error);
            }
        };

        let now = Utc::now();
        let item = CatalogItem {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            description,
            price_coins,
            logo,
            source,
            version,
            platform,
            created_at: now,
            updated_at: now,
        };

        if let Err(error) = self.items().create(&item) {
            tracing::error!(item_id = %item.id, %error, "failed to insert catalog item");
            return Err(MarketError::Persistence {
                reason: error.to_string(),
                compensation: staged.discard(self.backends.blobs),
            });
        }

        tracing::info!(
            item_id = %item.id,
            price_coins = item.price_coins,
            download_method = item.source.method(),
            "catalog item created"
        );
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::CatalogItemCreated)
                .with_user(&caller.user_id)
                .with_resource("catalog_item", &item.id)
                .with_details(serde_json::json!({ "title": item.title, "price_coins": item.price_coins }))
        );
        Ok(item)
    }

    /// Apply a partial update (admin only).
    ///
    /// New blobs are uploaded first, then the patch is applied to the stored
    /// row with a compare-and-swap, so concurrent updates never write back a
    /// stale copy of each other's fields. Only blobs the winning swap
    /// replaced are removed; a failure to remove them leaves them orphaned.
    pub fn update(
        &self,
        caller: &AuthenticatedUser,
        item_id: &str,
        patch: ItemPatch,
    ) -> MarketResult<CatalogItem> {
        ensure_admin(caller, "updating a catalog item")?;

        let title = patch
            .title
            .as_deref()
            .map(|title| required_text("title", title, MAX_TITLE_LEN))
            .transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(|text| optional_text("description", text, MAX_DESCRIPTION_LEN))
            .transpose()?;
        let version = patch
            .version
            .as_deref()
            .map(|version| required_text("version", version, MAX_TAG_LEN))
            .transpose()?;
        let platform = patch
            .platform
            .as_deref()
            .map(|platform| required_text("platform", platform, MAX_TAG_LEN))
            .transpose()?;
        let price_coins = patch.price_coins.map(validate_price).transpose()?;
        if let Some(logo) = &patch.logo {
            logo.ensure_image("logo")?;
        }
        let draft = SourceDraft::from_parts(&patch.files, patch.external_url.as_deref())?;

        let mut staged = StagedBlobs::default();
        let uploaded = self
            .stage_logo(patch.logo.as_ref(), &mut staged)
            .and_then(|logo| {
                let source = draft
                    .map(|draft| self.stage_source(draft, &mut staged))
                    .transpose()?;
                Ok((logo, source))
            });
        let (logo, source) = match uploaded {
            Ok(uploaded) => uploaded,
            Err(error) => {
                staged.discard(self.backends.blobs);
                return Err(error);
            }
        };

        let updated_at = Utc::now();
        let written = self.items().update(item_id, |current| {
            let mut item = current.clone();
            if let Some(title) = &title {
                item.title = title.clone();
            }
            if let Some(description) = &description {
                item.description = description.clone();
            }
            if let Some(version) = &version {
                item.version = version.clone();
            }
            if let Some(platform) = &platform {
                item.platform = platform.clone();
            }
            if let Some(price_coins) = price_coins {
                item.price_coins = price_coins;
            }
            if logo.is_some() {
                item.logo = logo.clone();
            }
            if let Some(source) = &source {
                item.source = source.clone();
            }
            item.updated_at = updated_at;
            item
        });

        let (previous, item) = match written {
            Ok(written) => written,
            Err(RowStoreError::NotFound { .. }) => {
                staged.discard(self.backends.blobs);
                return Err(MarketError::not_found("catalog item", item_id));
            }
            Err(error) => {
                tracing::error!(item_id, %error, "failed to update catalog item");
                return Err(MarketError::Persistence {
                    reason: error.to_string(),
                    compensation: staged.discard(self.backends.blobs),
                });
            }
        };

        // The row now points at the new blobs; the ones it replaced are unreferenced.
        if logo.is_some() && previous.logo != item.logo {
            discard_blobs(self.backends.blobs, Bucket::Logos, previous.logo.as_slice());
        }
        if source.is_some() && previous.source != item.source {
            discard_blobs(
                self.backends.blobs,
                Bucket::PluginFiles,
                previous.source.files(),
            );
        }

        tracing::info!(item_id, "catalog item updated");
        audit_log!(
            self.backends.audit,
            AuditEventType::CatalogItemUpdated,
            caller,
            "catalog_item",
            item_id
        );
        Ok(item)
    }

    /// Delete an item, its purchases and its blobs (admin only).
    ///
    /// The row goes first. Purchase and blob cleanup failures are logged and
    /// do not undo the deletion.
    pub fn delete(&self, caller: &AuthenticatedUser, item_id: &str) -> MarketResult<()> {
        ensure_admin(caller, "deleting a catalog item")?;

        let item = self.get(item_id)?;
        match self.items().delete(item_id) {
            Ok(()) => {}
            Err(RowStoreError::NotFound { .. }) => {
                return Err(MarketError::not_found("catalog item", item_id))
            }
            Err(error) => return Err(error.into()),
        }

        match PurchaseRepository::new(self.backends.rows).delete_for_item(item_id) {
            Ok(failed) if failed.is_empty() => {}
            Ok(failed) => {
                tracing::warn!(item_id, ?failed, "some purchases of a deleted item remain")
            }
            Err(error) => {
                tracing::warn!(item_id, %error, "failed to cascade purchases of a deleted item")
            }
        }

        discard_blobs(self.backends.blobs, Bucket::Logos, item.logo.as_slice());
        discard_blobs(self.backends.blobs, Bucket::PluginFiles, item.source.files());

        tracing::info!(item_id, "catalog item deleted");
        audit_log!(
            self.backends.audit,
            AuditEventType::CatalogItemDeleted,
            caller,
            "catalog_item",
            item_id
        );
        Ok(())
    }

    fn stage_logo(
        &self,
        logo: Option<&Upload>,
        staged: &mut StagedBlobs,
    ) -> MarketResult<Option<String>> {
        let Some(logo) = logo else {
            return Ok(None);
        };
        let name = generate_blob_name(None, logo.file_name.as_deref());
        self.backends
            .blobs
            .upload(Bucket::Logos, &name, &logo.bytes, &logo.content_type)?;
        staged.logo = Some(name.clone());
        Ok(Some(name))
    }

    /// Upload plugin files in order, recording each one in `staged`.
    fn stage_source(
        &self,
        draft: SourceDraft<'_>,
        staged: &mut StagedBlobs,
    ) -> MarketResult<ItemSource> {
        match draft {
            SourceDraft::External(url) => Ok(ItemSource::External { url }),
            SourceDraft::Files(files) => {
                for file in files {
                    let name = generate_blob_name(None, file.file_name.as_deref());
                    self.backends.blobs.upload(
                        Bucket::PluginFiles,
                        &name,
                        &file.bytes,
                        &file.content_type,
                    )?;
                    staged.files.push(name);
                }
                Ok(ItemSource::Upload {
                    files: staged.files.clone(),
                })
            }
        }
    }
}
