// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Marketplace Services
//!
//! Business rules over the row and blob stores:
//!
//! - [`LedgerService`] - the only code that changes a coin balance
//!   (deposit approval credits, purchase settlement debits)
//! - [`CatalogService`] - admin-managed plugin listings
//! - [`DownloadGate`] - signed download links for owned items
//! - [`RequestTracker`] - feature request tickets
//! - [`SettingsService`] - payment receiver settings
//! - [`StatsService`] - admin dashboard counters
//!
//! Services are synchronous and borrow their collaborators for the span of
//! one request, the same way repositories borrow the row store.

pub mod catalog;
pub mod downloads;
pub mod error;
pub mod ledger;
pub mod requests;
pub mod settings;
pub mod stats;

pub use catalog::{CatalogService, ItemPatch, NewItem};
pub use downloads::{DownloadGate, DownloadLink, DEFAULT_LINK_TTL};
pub use error::{MarketError, MarketResult};
pub use ledger::{Decision, DepositDraft, LedgerService, Settlement};
pub use requests::{NewRequest, RequestTracker};
pub use settings::{PaymentInstruction, SettingsService};
pub use stats::{MarketStats, StatsService};

use crate::storage::{AuditLog, BlobStore, Bucket, RowStore};

/// Collaborators shared by every service.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub rows: &'a dyn RowStore,
    pub blobs: &'a dyn BlobStore,
    pub audit: &'a AuditLog,
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name; only its extension is kept.
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<&str>, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.map(str::to_string),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    fn ensure_not_empty(&self, field: &str) -> MarketResult<()> {
        if self.bytes.is_empty() {
            return Err(MarketError::validation(format!("{field} is empty")));
        }
        Ok(())
    }

    fn ensure_image(&self, field: &str) -> MarketResult<()> {
        self.ensure_not_empty(field)?;
        if !self.content_type.starts_with("image/") {
            return Err(MarketError::validation(format!(
                "{field} must be an image, got {}",
                self.content_type
            )));
        }
        Ok(())
    }
}

/// Trimmed, non-empty, bounded text field.
fn required_text(field: &str, value: &str, max_len: usize) -> MarketResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MarketError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max_len {
        return Err(MarketError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Remove blobs written earlier in a failed operation.
///
/// Returns a description of the failure, if any, for error reporting.
fn discard_blobs(blobs: &dyn BlobStore, bucket: Bucket, names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    match blobs.remove(bucket, names) {
        Ok(()) => None,
        Err(error) => {
            tracing::error!(%bucket, ?names, %error, "failed to clean up uploaded blobs");
            Some(format!("cleanup of {bucket} blobs failed: {error}"))
        }
    }
}
