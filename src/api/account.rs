// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account and payment method endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, Role},
    error::ApiError,
    services::PaymentInstruction,
    state::AppState,
    storage::Account,
};

/// The caller's coin account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub account_id: String,
    /// Coins available to spend.
    pub balance: u64,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl AccountResponse {
    fn new(account: Account, role: Role) -> Self {
        Self {
            account_id: account.id,
            balance: account.balance,
            role,
            created_at: account.created_at,
        }
    }
}

/// Payment options shown on the deposit form.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodsResponse {
    pub methods: Vec<PaymentInstruction>,
}

/// Get the caller's account, opening it on first use.
#[utoipa::path(
    get,
    path = "/v1/account",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's account", body = AccountResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_account(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.ledger().open_account(&user)?;
    Ok(Json(AccountResponse::new(account, user.role)))
}

/// Receivers and QR codes for every payment method.
#[utoipa::path(
    get,
    path = "/v1/payment-methods",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payment instructions", body = PaymentMethodsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn payment_methods(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<PaymentMethodsResponse>, ApiError> {
    let methods = state.settings().payment_instructions()?;
    Ok(Json(PaymentMethodsResponse { methods }))
}
