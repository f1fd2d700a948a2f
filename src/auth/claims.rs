// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims read from a Clerk session token.
///
/// See: https://clerk.com/docs/backend-requests/handling/manual-jwt
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkClaims {
    /// Subject (user ID), used as the account id.
    pub sub: String,

    /// Expiration timestamp (0 when absent).
    #[serde(default)]
    pub exp: i64,

    #[serde(default)]
    pub iss: String,

    /// Clerk session ID
    #[serde(default)]
    pub sid: Option<String>,

    /// Public metadata; the session token template must expose it under
    /// this name.
    #[serde(default, rename = "publicMetadata")]
    pub public_metadata: Option<PublicMetadata>,
}

/// Clerk public metadata.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublicMetadata {
    /// Role set in the Clerk dashboard.
    #[serde(default)]
    pub role: Option<String>,
}

/// The caller of a request, as resolved by the identity gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (Clerk `sub` claim), also the account id.
    pub user_id: String,

    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp, 0 if the token had none).
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// A caller with the given id and role and no session.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            session_id: None,
            expires_at: 0,
        }
    }

    /// Create from Clerk claims.
    pub fn from_claims(claims: ClerkClaims) -> Self {
        let role = Role::from_claim(
            claims
                .public_metadata
                .as_ref()
                .and_then(|m| m.role.as_deref()),
        );

        Self {
            user_id: claims.sub,
            role,
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
