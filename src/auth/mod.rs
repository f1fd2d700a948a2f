// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! The identity gate: resolves the caller of a request from a Clerk JWT.
//!
//! ## Auth Flow
//!
//! 1. The storefront authenticates the player with Clerk
//! 2. It sends `Authorization: Bearer <Clerk JWT>`
//! 3. The server:
//!    - verifies the JWT against the Clerk JWKS (signature, expiry,
//!      issuer, audience)
//!    - takes `sub` as the account id
//!    - takes `publicMetadata.role` as the role (`admin` or `user`)
//!
//! Services only ever see [`AuthenticatedUser`]; how the role was encoded
//! stays in this module.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use jwks::JwksManager;
pub use roles::Role;
