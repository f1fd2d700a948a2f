// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Marketplace error taxonomy.
//!
//! Every service operation returns exactly one of these. Expected business
//! outcomes (insufficient funds, already owned) are separate variants from
//! infrastructure failures so callers can tell them apart.

use crate::storage::{AccessError, BalanceError, BlobError, RowStoreError};

/// Error returned by every service operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Wrong role, or acting for someone else's account.
    #[error(transparent)]
    Authorization(#[from] AccessError),

    /// Caller is who they claim but lacks the entitlement (no purchase).
    #[error("{0}")]
    Forbidden(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Operation not legal in the entity's current lifecycle state.
    #[error("{0}")]
    InvalidState(String),

    #[error("account {account_id} already owns item {item_id}")]
    DuplicatePurchase { account_id: String, item_id: String },

    #[error("insufficient funds: {required} coins required, {current} available")]
    InsufficientFunds { required: u64, current: u64 },

    /// Blob upload, read, delete or signing failed.
    #[error("blob storage failure: {0}")]
    Storage(#[from] BlobError),

    /// Row store failure. `compensation` describes a failed undo step, if
    /// one was attempted and did not succeed.
    #[error("persistence failure: {reason}")]
    Persistence {
        reason: String,
        compensation: Option<String>,
    },
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        MarketError::Validation(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        MarketError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        MarketError::InvalidState(message.into())
    }

    pub fn persistence(reason: impl std::fmt::Display) -> Self {
        MarketError::Persistence {
            reason: reason.to_string(),
            compensation: None,
        }
    }

    /// Persistence failure whose undo step also failed.
    pub fn uncompensated(reason: impl std::fmt::Display, compensation: impl std::fmt::Display) -> Self {
        MarketError::Persistence {
            reason: reason.to_string(),
            compensation: Some(compensation.to_string()),
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "validation_error",
            MarketError::Authorization(_) => "authorization_error",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::NotFound { .. } => "not_found",
            MarketError::InvalidState(_) => "invalid_state",
            MarketError::DuplicatePurchase { .. } => "duplicate_purchase",
            MarketError::InsufficientFunds { .. } => "insufficient_funds",
            MarketError::Storage(_) => "storage_error",
            MarketError::Persistence { .. } => "persistence_error",
        }
    }
}

impl From<RowStoreError> for MarketError {
    fn from(e: RowStoreError) -> Self {
        MarketError::persistence(e)
    }
}

impl From<BalanceError> for MarketError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::InsufficientFunds { required, current } => {
                MarketError::InsufficientFunds { required, current }
            }
            BalanceError::Overflow { .. } => MarketError::invalid_state(e.to_string()),
            BalanceError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;

    #[test]
    fn balance_errors_keep_amounts() {
        let err: MarketError = BalanceError::InsufficientFunds {
            required: 300,
            current: 200,
        }
        .into();
        assert!(matches!(
            err,
            MarketError::InsufficientFunds {
                required: 300,
                current: 200
            }
        ));
        assert_eq!(err.error_code(), "insufficient_funds");
    }

    #[test]
    fn row_store_errors_are_persistence() {
        let err: MarketError = RowStoreError::Contention {
            table: Table::Accounts,
            id: "user_1".into(),
        }
        .into();
        assert!(matches!(
            err,
            MarketError::Persistence {
                compensation: None,
                ..
            }
        ));
    }

    #[test]
    fn messages_are_readable() {
        assert_eq!(
            MarketError::not_found("deposit", "dep_1").to_string(),
            "deposit dep_1 not found"
        );
        assert_eq!(
            MarketError::uncompensated("insert failed", "refund failed").to_string(),
            "persistence failure: insert failed"
        );
    }
}
