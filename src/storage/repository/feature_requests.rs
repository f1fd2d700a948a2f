// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Feature request repository.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Record, Rows, TransitionError};
use crate::storage::row_store::{RowStore, RowStoreResult, Table};

/// Feature request status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Whether `self → next` is a legal status change.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::InProgress)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::InProgress, RequestStatus::Completed)
        )
    }

    /// Completed and rejected requests never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown request status: {s}"))
    }
}

/// A user's request for a new plugin or a change to an existing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct FeatureRequest {
    pub id: String,
    pub account_id: String,
    pub requester_name: String,
    pub requester_email: String,
    /// Plugin or mod the request is about.
    pub target_name: String,
    pub platform: String,
    pub supported_versions: Vec<String>,
    pub category: String,
    pub description: String,
    pub status: RequestStatus,
    /// Note left by the admin on the last status change.
    #[serde(default)]
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for FeatureRequest {
    const TABLE: Table = Table::FeatureRequests;

    fn id(&self) -> &str {
        &self.id
    }
}

impl crate::storage::OwnedResource for FeatureRequest {
    fn owner_account_id(&self) -> &str {
        &self.account_id
    }
}

/// Repository for feature request rows.
pub struct FeatureRequestRepository<'a> {
    rows: Rows<'a>,
}

impl<'a> FeatureRequestRepository<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self {
            rows: Rows::new(store),
        }
    }

    pub fn get(&self, request_id: &str) -> RowStoreResult<Option<FeatureRequest>> {
        self.rows.get(request_id)
    }

    pub fn create(&self, request: &FeatureRequest) -> RowStoreResult<()> {
        self.rows.insert(request)
    }

    /// All requests, newest first.
    pub fn list_all(&self) -> RowStoreResult<Vec<FeatureRequest>> {
        let mut requests: Vec<FeatureRequest> = self.rows.list()?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Requests filed by one account, newest first.
    pub fn list_by_account(&self, account_id: &str) -> RowStoreResult<Vec<FeatureRequest>> {
        let mut requests = self.list_all()?;
        requests.retain(|r| r.account_id == account_id);
        Ok(requests)
    }

    /// Apply a status change if the transition table allows it from the
    /// row's current status.
    pub fn set_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        note: Option<&str>,
    ) -> Result<FeatureRequest, TransitionError<RequestStatus>> {
        self.rows.modify(request_id, |request: &FeatureRequest| {
            if !request.status.can_transition_to(status) {
                return Err(TransitionError::Conflict {
                    current: request.status,
                });
            }
            let mut next = request.clone();
            next.status = status;
            if let Some(note) = note {
                next.admin_note = Some(note.to_string());
            }
            next.updated_at = Utc::now();
            Ok(Some(next))
        })
    }
}
