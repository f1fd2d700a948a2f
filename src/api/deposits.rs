// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deposit endpoints.
//!
//! Players submit a deposit with a payment screenshot; admins approve or
//! reject it. Approval is the only way coins enter an account.

use std::time::Duration;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::forms::Form;
use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    services::{Decision, DepositDraft},
    state::AppState,
    storage::{Bucket, Deposit, DepositStatus, PaymentMethod},
};

/// Screenshot links are for a reviewer looking at the page right now.
const SCREENSHOT_LINK_TTL: Duration = Duration::from_secs(15 * 60);

/// Multipart body for `POST /v1/deposits` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct DepositForm {
    /// Coins requested.
    pub amount: i64,
    pub method: PaymentMethod,
    /// Transaction id from the payment app.
    pub transaction_ref: String,
    /// Payment screenshot (image).
    #[schema(value_type = String, format = Binary)]
    pub screenshot: Vec<u8>,
}

/// A deposit as shown to its owner or an admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepositResponse {
    pub id: String,
    pub account_id: String,
    pub amount: u64,
    pub method: PaymentMethod,
    pub transaction_ref: String,
    pub status: DepositStatus,
    /// Short-lived link to the payment screenshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DepositResponse {
    fn build(state: &AppState, deposit: Deposit) -> Self {
        let screenshot_url = match state.blobs.signed_url(
            Bucket::PaymentScreenshots,
            &deposit.screenshot,
            SCREENSHOT_LINK_TTL,
        ) {
            Ok(signed) => Some(signed.url),
            Err(error) => {
                tracing::warn!(deposit_id = %deposit.id, %error, "failed to sign screenshot url");
                None
            }
        };

        Self {
            id: deposit.id,
            account_id: deposit.account_id,
            amount: deposit.amount,
            method: deposit.method,
            transaction_ref: deposit.transaction_ref,
            status: deposit.status,
            screenshot_url,
            created_at: deposit.created_at,
            updated_at: deposit.updated_at,
            resolved_by: deposit.resolved_by,
            resolved_at: deposit.resolved_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DepositListResponse {
    pub deposits: Vec<DepositResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DepositListQuery {
    /// Only deposits in this status.
    pub status: Option<String>,
}

/// Submit a deposit for review.
#[utoipa::path(
    post,
    path = "/v1/deposits",
    tag = "Deposits",
    security(("bearer_auth" = [])),
    request_body(content = DepositForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Deposit submitted", body = DepositResponse),
        (status = 400, description = "Invalid amount, method or screenshot"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn submit_deposit(
    Auth(user): Auth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DepositResponse>), ApiError> {
    let mut form = Form::read(multipart).await?;

    let draft = DepositDraft {
        account_id: user.user_id.clone(),
        amount: form
            .parse::<i64>("amount")?
            .ok_or_else(|| ApiError::bad_request("amount is required"))?,
        method: form
            .parse::<PaymentMethod>("method")?
            .ok_or_else(|| ApiError::bad_request("method is required"))?,
        transaction_ref: form.text_or_empty("transaction_ref"),
        screenshot: form.take_file("screenshot"),
    };

    let deposit = state.ledger().submit_deposit(&user, draft)?;
    Ok((StatusCode::CREATED, Json(DepositResponse::build(&state, deposit))))
}

/// List the caller's deposits, or every deposit for an admin.
#[utoipa::path(
    get,
    path = "/v1/deposits",
    tag = "Deposits",
    security(("bearer_auth" = [])),
    params(DepositListQuery),
    responses(
        (status = 200, description = "Deposits, newest first", body = DepositListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_deposits(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<DepositListQuery>,
) -> Result<Json<DepositListResponse>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<DepositStatus>().map_err(ApiError::bad_request)?),
    };

    let deposits: Vec<DepositResponse> = state
        .ledger()
        .list_deposits(&user, status)?
        .into_iter()
        .map(|deposit| DepositResponse::build(&state, deposit))
        .collect();
    let total = deposits.len();

    Ok(Json(DepositListResponse { deposits, total }))
}

/// Approve a pending deposit and credit its coins.
#[utoipa::path(
    post,
    path = "/v1/admin/deposits/{deposit_id}/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("deposit_id" = String, Path, description = "Deposit ID")),
    responses(
        (status = 200, description = "Deposit approved", body = DepositResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Deposit not found"),
        (status = 409, description = "Deposit already resolved")
    )
)]
pub async fn approve_deposit(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(deposit_id): Path<String>,
) -> Result<Json<DepositResponse>, ApiError> {
    let deposit = state
        .ledger()
        .resolve_deposit(&admin, &deposit_id, Decision::Approved)?;
    Ok(Json(DepositResponse::build(&state, deposit)))
}

/// Reject a pending deposit.
#[utoipa::path(
    post,
    path = "/v1/admin/deposits/{deposit_id}/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("deposit_id" = String, Path, description = "Deposit ID")),
    responses(
        (status = 200, description = "Deposit rejected", body = DepositResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Deposit not found"),
        (status = 409, description = "Deposit already resolved")
    )
)]
pub async fn reject_deposit(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(deposit_id): Path<String>,
) -> Result<Json<DepositResponse>, ApiError> {
    let deposit = state
        .ledger()
        .resolve_deposit(&admin, &deposit_id, Decision::Rejected)?;
    Ok(Json(DepositResponse::build(&state, deposit)))
}

/// Finish an approval that stalled after the status change.
#[utoipa::path(
    post,
    path = "/v1/admin/deposits/{deposit_id}/reconcile",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("deposit_id" = String, Path, description = "Deposit ID")),
    responses(
        (status = 200, description = "Deposit approved and credited", body = DepositResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Deposit not found"),
        (status = 409, description = "Deposit is not crediting")
    )
)]
pub async fn reconcile_deposit(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(deposit_id): Path<String>,
) -> Result<Json<DepositResponse>, ApiError> {
    let deposit = state.ledger().reconcile_deposit(&admin, &deposit_id)?;
    Ok(Json(DepositResponse::build(&state, deposit)))
}
