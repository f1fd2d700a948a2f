// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blob retrieval.
//!
//! Public buckets (logos, payment QR codes) are served as-is. Private
//! buckets only answer URLs signed by the blob store, which is how
//! download links and screenshot links are delivered.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{BlobError, Bucket},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SignatureQuery {
    /// Unix timestamp after which the link is dead.
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

fn blob_error(error: BlobError) -> ApiError {
    match error {
        BlobError::InvalidSignature => ApiError::forbidden("Link is invalid or expired"),
        BlobError::NotFound { .. } | BlobError::InvalidName(_) => {
            ApiError::not_found("Blob not found")
        }
        other => {
            tracing::error!(error = %other, "blob read failed");
            ApiError::internal("Failed to read blob")
        }
    }
}

/// Serve a stored blob.
#[utoipa::path(
    get,
    path = "/blobs/{bucket}/{name}",
    tag = "Blobs",
    params(
        ("bucket" = String, Path, description = "logos, plugin-files, payment-screenshots or payment-qr"),
        ("name" = String, Path, description = "Blob name"),
        SignatureQuery
    ),
    responses(
        (status = 200, description = "Blob bytes"),
        (status = 403, description = "Missing, invalid or expired signature"),
        (status = 404, description = "Blob not found")
    )
)]
pub async fn get_blob(
    State(state): State<AppState>,
    Path((bucket, name)): Path<(String, String)>,
    Query(query): Query<SignatureQuery>,
) -> Result<Response, ApiError> {
    let bucket = Bucket::from_name(&bucket).ok_or_else(|| ApiError::not_found("Unknown bucket"))?;

    if !bucket.is_public() {
        let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
            return Err(ApiError::forbidden("A signed link is required"));
        };
        state
            .blobs
            .verify_signature(bucket, &name, expires, signature)
            .map_err(blob_error)?;
    }

    let blob = state.blobs.fetch(bucket, &name).map_err(blob_error)?;
    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        blob.bytes,
    )
        .into_response();

    let headers = response.headers_mut();
    if bucket.is_public() {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        );
    } else {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    }
    if bucket == Bucket::PluginFiles {
        headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
    }

    Ok(response)
}
