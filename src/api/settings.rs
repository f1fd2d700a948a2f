// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site settings endpoints.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::forms::Form;
use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    state::AppState,
    storage::{PaymentMethod, Setting},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub settings: Vec<Setting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PutSettingRequest {
    /// New value; empty removes the setting.
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PutSettingResponse {
    pub key: String,
    /// The stored setting, absent when it was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting: Option<Setting>,
}

/// Multipart body for QR uploads (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct QrForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// Read every setting.
#[utoipa::path(
    get,
    path = "/v1/settings",
    tag = "Settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_settings(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.settings().list()?;
    Ok(Json(SettingsResponse { settings }))
}

/// Write or remove a setting.
#[utoipa::path(
    put,
    path = "/v1/admin/settings/{key}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("key" = String, Path, description = "Setting key ([a-z0-9_])")),
    request_body = PutSettingRequest,
    responses(
        (status = 200, description = "Setting written or removed", body = PutSettingResponse),
        (status = 400, description = "Invalid key or value"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn put_setting(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<PutSettingRequest>,
) -> Result<Json<PutSettingResponse>, ApiError> {
    let setting = state.settings().set(&admin, &key, &body.value)?;
    Ok(Json(PutSettingResponse { key, setting }))
}

/// Replace the receiver QR code for a payment method.
#[utoipa::path(
    post,
    path = "/v1/admin/settings/qr/{method}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("method" = String, Path, description = "easypaisa, jazzcash or upi")),
    request_body(content = QrForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "QR code stored", body = Setting),
        (status = 400, description = "Unknown method or not an image"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn upload_qr(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(method): Path<String>,
    multipart: Multipart,
) -> Result<Json<Setting>, ApiError> {
    let method: PaymentMethod = method.parse().map_err(ApiError::bad_request)?;
    let mut form = Form::read(multipart).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| ApiError::bad_request("image is required"))?;

    let setting = state.settings().upload_qr(&admin, method, image)?;
    Ok(Json(setting))
}
