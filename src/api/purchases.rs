// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Purchase and download endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    state::AppState,
    storage::Purchase,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseResponse {
    pub id: String,
    pub account_id: String,
    pub item_id: String,
    /// Coins debited at settlement.
    pub price_coins: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Purchase> for PurchaseResponse {
    fn from(purchase: Purchase) -> Self {
        Self {
            id: purchase.id,
            account_id: purchase.account_id,
            item_id: purchase.item_id,
            price_coins: purchase.price_coins,
            created_at: purchase.created_at,
        }
    }
}

/// Result of buying an item.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseReceipt {
    pub purchase: PurchaseResponse,
    /// Balance after the debit.
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseListResponse {
    pub purchases: Vec<PurchaseResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Index of the file to download (default 0).
    pub file: Option<usize>,
}

/// Buy a catalog item with coins.
#[utoipa::path(
    post,
    path = "/v1/catalog/{item_id}/purchase",
    tag = "Purchases",
    security(("bearer_auth" = [])),
    params(("item_id" = String, Path, description = "Catalog item ID")),
    responses(
        (status = 201, description = "Item purchased", body = PurchaseReceipt),
        (status = 402, description = "Insufficient funds", body = ErrorBody),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item already purchased")
    )
)]
pub async fn purchase_item(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<(StatusCode, Json<PurchaseReceipt>), ApiError> {
    let ledger = state.ledger();
    // First contact may be a purchase of a free item
    ledger.open_account(&user)?;
    let settlement = ledger.settle_purchase(&user, &user.user_id, &item_id)?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseReceipt {
            purchase: settlement.purchase.into(),
            balance: settlement.balance,
        }),
    ))
}

/// List the caller's purchases, newest first.
#[utoipa::path(
    get,
    path = "/v1/purchases",
    tag = "Purchases",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's purchases", body = PurchaseListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_purchases(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<PurchaseListResponse>, ApiError> {
    let purchases: Vec<PurchaseResponse> = state
        .ledger()
        .list_purchases(&user)?
        .into_iter()
        .map(PurchaseResponse::from)
        .collect();
    let total = purchases.len();
    Ok(Json(PurchaseListResponse { purchases, total }))
}

/// Redirect to a download link for a purchased item.
#[utoipa::path(
    get,
    path = "/v1/catalog/{item_id}/download",
    tag = "Purchases",
    security(("bearer_auth" = [])),
    params(
        ("item_id" = String, Path, description = "Catalog item ID"),
        DownloadQuery
    ),
    responses(
        (status = 307, description = "Redirect to the file or external host"),
        (status = 400, description = "File index out of range"),
        (status = 403, description = "Item not purchased"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn download_item(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Redirect, ApiError> {
    let link = state
        .downloads()
        .authorize_download(&user, &user.user_id, &item_id, query.file)?;
    Ok(Redirect::temporary(&link.url))
}
