// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Download gate: turns a purchase into a short-lived retrieval link.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Backends, MarketError, MarketResult};
use crate::audit_log;
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_self, AuditEvent, AuditEventType, Bucket, CatalogRepository, ItemSource,
    PurchaseRepository,
};

/// Lifetime of a signed plugin-file URL.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(60);

/// Where to send the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    pub url: String,
    /// `None` for external links, which do not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct DownloadGate<'a> {
    backends: Backends<'a>,
    ttl: Duration,
}

impl<'a> DownloadGate<'a> {
    pub fn new(backends: Backends<'a>, ttl: Duration) -> Self {
        Self { backends, ttl }
    }

    /// Issue a link for `file` (default 0) of an item the account owns.
    ///
    /// A purchase row is required even for free items.
    pub fn authorize_download(
        &self,
        caller: &AuthenticatedUser,
        account_id: &str,
        item_id: &str,
        file: Option<usize>,
    ) -> MarketResult<DownloadLink> {
        ensure_self(caller, account_id)?;

        let item = CatalogRepository::new(self.backends.rows)
            .get(item_id)?
            .ok_or_else(|| MarketError::not_found("catalog item", item_id))?;

        if PurchaseRepository::new(self.backends.rows)
            .find(account_id, item_id)?
            .is_none()
        {
            tracing::info!(account_id, item_id, "download refused, item not purchased");
            return Err(MarketError::Forbidden(format!(
                "item {item_id} has not been purchased"
            )));
        }

        let link = match &item.source {
            ItemSource::External { url } => DownloadLink {
                url: url.clone(),
                expires_at: None,
            },
            ItemSource::Upload { files } => {
                let index = file.unwrap_or(0);
                let name = files.get(index).ok_or_else(|| {
                    MarketError::validation(format!(
                        "file index {index} is out of range, item has {} file(s)",
                        files.len()
                    ))
                })?;
                let signed = self
                    .backends
                    .blobs
                    .signed_url(Bucket::PluginFiles, name, self.ttl)?;
                DownloadLink {
                    url: signed.url,
                    expires_at: Some(signed.expires_at),
                }
            }
        };

        tracing::debug!(account_id, item_id, "download authorized");
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::DownloadAuthorized)
                .with_user(&caller.user_id)
                .with_resource("catalog_item", item_id)
                .with_details(serde_json::json!({ "file": file.unwrap_or(0) }))
        );
        Ok(link)
    }
}
