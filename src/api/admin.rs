// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for the dashboard.
//!
//! These endpoints require the Admin role and provide:
//! - Marketplace statistics
//! - Audit log queries

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    services::MarketStats,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Marketplace statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: MarketStats,
    /// Current timestamp.
    pub timestamp: String,
}

/// Query parameters for audit log queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD format).
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD format).
    pub end_date: Option<String>,
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by event type (e.g. `deposit_approved`).
    pub event_type: Option<String>,
    /// Filter by resource type.
    pub resource_type: Option<String>,
    /// Filter by resource ID.
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events matching the query.
    pub events: Vec<AuditEvent>,
    /// Total count (before limit/offset).
    pub total: usize,
    /// Whether there are more results.
    pub has_more: bool,
}

/// Get marketplace statistics.
#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Marketplace statistics", body = StatsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn get_stats(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.stats().stats(&user)?;

    audit_log!(&state.audit, AuditEventType::AdminAccess, &user);

    Ok(Json(StatsResponse {
        stats,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

fn event_type_name(event_type: &AuditEventType) -> String {
    serde_json::to_value(event_type)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Query audit logs.
///
/// Date range defaults to today. Filters combine with AND.
#[utoipa::path(
    get,
    path = "/v1/admin/audit/events",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_logs(
    AdminOnly(admin_user): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let start_date = params.start_date.as_deref().unwrap_or(&today);
    let end_date = params.end_date.as_deref().unwrap_or(&today);

    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid start_date format. Use YYYY-MM-DD."))?;
    let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid end_date format. Use YYYY-MM-DD."))?;
    if end < start {
        return Err(ApiError::bad_request("end_date is before start_date"));
    }

    let mut events = state
        .audit
        .read_events_range(start_date, end_date)
        .map_err(|e| ApiError::internal(format!("Failed to read audit log: {e}")))?;

    if let Some(user_id) = &params.user_id {
        events.retain(|e| e.user_id.as_deref() == Some(user_id.as_str()));
    }
    if let Some(event_type) = &params.event_type {
        events.retain(|e| event_type_name(&e.event_type) == *event_type);
    }
    if let Some(resource_type) = &params.resource_type {
        events.retain(|e| e.resource_type.as_deref() == Some(resource_type.as_str()));
    }
    if let Some(resource_id) = &params.resource_id {
        events.retain(|e| e.resource_id.as_deref() == Some(resource_id.as_str()));
    }

    let total = events.len();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let has_more = offset.saturating_add(limit) < total;
    let events: Vec<AuditEvent> = events.into_iter().skip(offset).take(limit).collect();

    audit_log!(&state.audit, AuditEventType::AdminAccess, &admin_user);

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, Role};
    use crate::state::tests::test_state;

    fn admin() -> AdminOnly {
        AdminOnly(AuthenticatedUser::new("admin_1", Role::Admin))
    }

    #[test]
    fn event_type_names_match_serialized_form() {
        assert_eq!(
            event_type_name(&AuditEventType::DepositApproved),
            "deposit_approved"
        );
    }

    #[tokio::test]
    async fn audit_query_filters_and_pages() {
        let (state, _temp) = test_state();
        let buyer = AuthenticatedUser::new("user_1", Role::User);
        state.ledger().open_account(&buyer).unwrap();
        state
            .ledger()
            .open_account(&AuthenticatedUser::new("user_2", Role::User))
            .unwrap();

        let Json(all) = query_audit_logs(
            admin(),
            State(state.clone()),
            Query(AuditQueryParams {
                event_type: Some("account_opened".to_string()),
                ..AuditQueryParams::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(all.total, 2);

        let Json(page) = query_audit_logs(
            admin(),
            State(state.clone()),
            Query(AuditQueryParams {
                event_type: Some("account_opened".to_string()),
                limit: Some(1),
                ..AuditQueryParams::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(page.events.len(), 1);
        assert!(page.has_more);

        let Json(mine) = query_audit_logs(
            admin(),
            State(state),
            Query(AuditQueryParams {
                user_id: Some("user_1".to_string()),
                ..AuditQueryParams::default()
            }),
        )
        .await
        .unwrap();
        assert!(mine.events.iter().all(|e| e.user_id.as_deref() == Some("user_1")));
        assert!(mine.total >= 1);
    }

    #[tokio::test]
    async fn rejects_bad_dates() {
        let (state, _temp) = test_state();
        let result = query_audit_logs(
            admin(),
            State(state),
            Query(AuditQueryParams {
                start_date: Some("yesterday".to_string()),
                ..AuditQueryParams::default()
            }),
        )
        .await;
        assert_eq!(result.unwrap_err().status, axum::http::StatusCode::BAD_REQUEST);
    }
}
