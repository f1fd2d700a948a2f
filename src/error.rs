// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error responses.
//!
//! Every failure leaves the API as `{ "error": ..., "error_code": ... }`.
//! Insufficient funds also carries `required` and `current` so the
//! storefront can show how many coins are missing. A persistence failure
//! whose undo step also failed carries that step's outcome in
//! `compensation`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::MarketError;
use crate::storage::BlobError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
    pub funds: Option<FundsShortfall>,
    /// Outcome of a failed compensating write.
    pub compensation: Option<String>,
}

/// Amounts attached to an insufficient-funds error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct FundsShortfall {
    pub required: u64,
    pub current: u64,
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
            funds: None,
            compensation: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<MarketError> for ApiError {
    fn from(error: MarketError) -> Self {
        let status = match &error {
            MarketError::Validation(_) => StatusCode::BAD_REQUEST,
            MarketError::Authorization(_) | MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarketError::InvalidState(_) | MarketError::DuplicatePurchase { .. } => {
                StatusCode::CONFLICT
            }
            MarketError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            MarketError::Storage(BlobError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            MarketError::Storage(BlobError::NotFound { .. }) => StatusCode::NOT_FOUND,
            MarketError::Storage(_) => StatusCode::BAD_GATEWAY,
            MarketError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            match &error {
                MarketError::Persistence {
                    reason,
                    compensation: Some(compensation),
                } => tracing::error!(%reason, %compensation, "request failed and was not fully compensated"),
                other => tracing::error!(error = %other, "request failed"),
            }
        }

        let error_code = error.error_code();
        let message = error.to_string();
        let (funds, compensation) = match error {
            MarketError::InsufficientFunds { required, current } => {
                (Some(FundsShortfall { required, current }), None)
            }
            MarketError::Persistence { compensation, .. } => (None, compensation),
            _ => (None, None),
        };

        Self {
            status,
            error_code,
            message,
            funds,
            compensation,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
            required: self.funds.map(|f| f.required),
            current: self.funds.map(|f| f.current),
            compensation: self.compensation,
        });
        (self.status, body).into_response()
    }
}
