// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog endpoints.
//!
//! Browsing is public. Writes need the admin role and take multipart
//! bodies carrying the logo and plugin files.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::forms::Form;
use crate::{
    auth::AdminOnly,
    error::ApiError,
    services::{ItemPatch, NewItem},
    state::AppState,
    storage::CatalogItem,
};

/// Multipart body for catalog writes (documentation only).
///
/// On update every field is optional; omitted fields keep their value.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CatalogItemForm {
    pub title: String,
    pub description: String,
    /// Price in coins; zero means free.
    pub price_coins: i64,
    pub version: String,
    pub platform: String,
    /// Logo image.
    #[schema(value_type = Option<String>, format = Binary)]
    pub logo: Option<Vec<u8>>,
    /// Plugin files, repeated. Mutually exclusive with `external_url`.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
    /// Third-party download link.
    pub external_url: Option<String>,
}

/// A catalog listing as shown in the storefront.
///
/// External download URLs stay private until the download gate hands
/// them to a buyer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogItemResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price_coins: u64,
    pub version: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// `upload` or `external`.
    pub download_method: String,
    /// Number of downloadable files (zero for external items).
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItemResponse {
    fn build(state: &AppState, item: CatalogItem) -> Self {
        let logo_url = state.catalog().logo_url(&item);
        Self {
            download_method: item.source.method().to_string(),
            file_count: item.source.files().len(),
            id: item.id,
            title: item.title,
            description: item.description,
            price_coins: item.price_coins,
            version: item.version,
            platform: item.platform,
            logo_url,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogListResponse {
    pub items: Vec<CatalogItemResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteItemResponse {
    pub item_id: String,
    pub message: String,
}

/// List every catalog item, newest first.
#[utoipa::path(
    get,
    path = "/v1/catalog",
    tag = "Catalog",
    responses(
        (status = 200, description = "Catalog listing", body = CatalogListResponse)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
) -> Result<Json<CatalogListResponse>, ApiError> {
    let items: Vec<CatalogItemResponse> = state
        .catalog()
        .list()?
        .into_iter()
        .map(|item| CatalogItemResponse::build(&state, item))
        .collect();
    let total = items.len();
    Ok(Json(CatalogListResponse { items, total }))
}

/// Get a single catalog item.
#[utoipa::path(
    get,
    path = "/v1/catalog/{item_id}",
    tag = "Catalog",
    params(("item_id" = String, Path, description = "Catalog item ID")),
    responses(
        (status = 200, description = "Catalog item", body = CatalogItemResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<CatalogItemResponse>, ApiError> {
    let item = state.catalog().get(&item_id)?;
    Ok(Json(CatalogItemResponse::build(&state, item)))
}

/// Create a catalog item.
#[utoipa::path(
    post,
    path = "/v1/admin/catalog",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body(content = CatalogItemForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Item created", body = CatalogItemResponse),
        (status = 400, description = "Invalid item"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn create_item(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CatalogItemResponse>), ApiError> {
    let mut form = Form::read(multipart).await?;

    let new = NewItem {
        title: form.text_or_empty("title"),
        description: form.text_or_empty("description"),
        price_coins: form
            .parse::<i64>("price_coins")?
            .ok_or_else(|| ApiError::bad_request("price_coins is required"))?,
        version: form.text_or_empty("version"),
        platform: form.text_or_empty("platform"),
        logo: form.take_file("logo"),
        files: form.take_files("files"),
        external_url: form.non_blank("external_url"),
    };

    let item = state.catalog().create(&admin, new)?;
    Ok((StatusCode::CREATED, Json(CatalogItemResponse::build(&state, item))))
}

/// Update a catalog item.
#[utoipa::path(
    put,
    path = "/v1/admin/catalog/{item_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("item_id" = String, Path, description = "Catalog item ID")),
    request_body(content = CatalogItemForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Item updated", body = CatalogItemResponse),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<CatalogItemResponse>, ApiError> {
    let mut form = Form::read(multipart).await?;

    let patch = ItemPatch {
        title: form.non_blank("title"),
        description: form.text("description").map(str::to_string),
        price_coins: form.parse::<i64>("price_coins")?,
        version: form.non_blank("version"),
        platform: form.non_blank("platform"),
        logo: form.take_file("logo"),
        files: form.take_files("files"),
        external_url: form.non_blank("external_url"),
    };

    let item = state.catalog().update(&admin, &item_id, patch)?;
    Ok(Json(CatalogItemResponse::build(&state, item)))
}

/// Delete a catalog item, its purchases and its blobs.
#[utoipa::path(
    delete,
    path = "/v1/admin/catalog/{item_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("item_id" = String, Path, description = "Catalog item ID")),
    responses(
        (status = 200, description = "Item deleted", body = DeleteItemResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<DeleteItemResponse>, ApiError> {
    state.catalog().delete(&admin, &item_id)?;
    Ok(Json(DeleteItemResponse {
        item_id,
        message: "Catalog item deleted".to_string(),
    }))
}
