// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Feature request endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    services::NewRequest,
    state::AppState,
    storage::{FeatureRequest, RequestStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateFeatureRequest {
    pub requester_name: String,
    pub requester_email: String,
    /// Plugin or mod the request is about.
    pub target_name: String,
    pub platform: String,
    /// Game versions the plugin should support.
    pub supported_versions: Vec<String>,
    pub category: String,
    pub description: String,
}

impl From<CreateFeatureRequest> for NewRequest {
    fn from(body: CreateFeatureRequest) -> Self {
        Self {
            requester_name: body.requester_name,
            requester_email: body.requester_email,
            target_name: body.target_name,
            platform: body.platform,
            supported_versions: body.supported_versions,
            category: body.category,
            description: body.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRequestStatus {
    pub status: RequestStatus,
    /// Note shown to the requester.
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeatureRequestListResponse {
    pub requests: Vec<FeatureRequest>,
    pub total: usize,
}

/// File a feature request.
#[utoipa::path(
    post,
    path = "/v1/requests",
    tag = "Requests",
    security(("bearer_auth" = [])),
    request_body = CreateFeatureRequest,
    responses(
        (status = 201, description = "Request filed", body = FeatureRequest),
        (status = 400, description = "Missing or invalid field"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_request(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<CreateFeatureRequest>,
) -> Result<(StatusCode, Json<FeatureRequest>), ApiError> {
    let request = state.requests().create(&user, body.into())?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List the caller's requests, or every request for an admin.
#[utoipa::path(
    get,
    path = "/v1/requests",
    tag = "Requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Feature requests, newest first", body = FeatureRequestListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_requests(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<FeatureRequestListResponse>, ApiError> {
    let requests = state.requests().list(&user)?;
    let total = requests.len();
    Ok(Json(FeatureRequestListResponse { requests, total }))
}

/// Move a request along its review workflow.
#[utoipa::path(
    put,
    path = "/v1/admin/requests/{request_id}/status",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("request_id" = String, Path, description = "Feature request ID")),
    request_body = UpdateRequestStatus,
    responses(
        (status = 200, description = "Status updated", body = FeatureRequest),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn update_request_status(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(body): Json<UpdateRequestStatus>,
) -> Result<Json<FeatureRequest>, ApiError> {
    let request = state.requests().update_status(
        &admin,
        &request_id,
        body.status,
        body.note.as_deref(),
    )?;
    Ok(Json(request))
}
