// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CraftMarket - Minecraft plugin marketplace service
//!
//! Players top up a coin balance through manually reviewed deposits, spend
//! coins on catalog items, and download what they own through short-lived
//! signed links. Admins curate the catalog, review deposits and track
//! feature requests.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Authentication and authorization (Clerk JWT)
//! - `services` - Ledger, catalog, downloads, requests, settings, stats
//! - `storage` - Row store (redb), blob store and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod storage;
