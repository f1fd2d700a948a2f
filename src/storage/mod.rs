// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for the marketplace, split into two collaborators:
//!
//! - a **row store** ([`RowStore`]) holding JSON rows per table, whose only
//!   atomic primitive is a single-row compare-and-swap;
//! - a **blob store** ([`BlobStore`]) holding uploaded files in buckets and
//!   minting public or signed retrieval URLs.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   market.redb                 # accounts, catalog, purchases, deposits,
//!                               # feature requests, settings
//!   blobs/
//!     logos/ plugin-files/ payment-screenshots/ payment-qr/
//!     .meta/{bucket}/{name}.json
//!   audit/
//!     {date}/events.jsonl       # Daily audit logs
//! ```
//!
//! No operation spans two rows atomically. Multi-step flows live in the
//! services and compensate on failure.

pub mod audit;
pub mod blob_store;
pub mod ownership;
pub mod paths;
pub mod redb_store;
pub mod repository;
pub mod row_store;

pub use audit::{AuditError, AuditEvent, AuditEventType, AuditLog};
pub use blob_store::{
    generate_blob_name, generate_signing_key, BlobError, BlobResult, BlobStore, Bucket,
    FsBlobStore, SignedUrl, StoredBlob,
};
pub use ownership::{ensure_admin, ensure_self, AccessError, OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use redb_store::RedbStore;
pub use repository::{
    Account, AccountRepository, BalanceError, CatalogItem, CatalogRepository, Deposit,
    DepositRepository, DepositStatus, FeatureRequest, FeatureRequestRepository, ItemSource,
    PaymentMethod, Purchase, PurchaseRepository, RequestStatus, Setting, SettingsRepository,
    TransitionError,
};
pub use row_store::{RowStore, RowStoreError, RowStoreResult, Table};
