// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for balance-changing and administrative operations.
//!
//! Every deposit decision, purchase settlement, catalog change and
//! settings write is appended to a daily JSONL file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::StoragePaths;

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Ledger events
    AccountOpened,
    DepositSubmitted,
    DepositApproved,
    DepositRejected,
    DepositReconciled,
    PurchaseSettled,
    DownloadAuthorized,

    // Catalog events
    CatalogItemCreated,
    CatalogItemUpdated,
    CatalogItemDeleted,

    // Feature request events
    FeatureRequestCreated,
    FeatureRequestStatusChanged,

    // Admin events
    AdminAccess,
    SettingChanged,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (deposit_id, item_id, etc.).
    pub resource_id: Option<String>,
    /// Resource type (deposit, catalog_item, etc.).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Error type for audit log access.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("audit serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid audit date: {0}")]
    InvalidDate(String),
}

/// Append-only audit log.
pub struct AuditLog {
    paths: StoragePaths,
    append_lock: Mutex<()>,
}

impl AuditLog {
    /// Create an audit log under the data directory.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            append_lock: Mutex::new(()),
        }
    }

    /// Append an event to the daily JSONL file.
    pub fn log(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.paths.audit_events_file(&date);

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Read audit events for a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> Result<Vec<AuditEvent>, AuditError> {
        let path = self.paths.audit_events_file(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }

    /// Read events for an inclusive date range.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .map_err(|e| AuditError::InvalidDate(format!("{start_date}: {e}")))?;
        let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
            .map_err(|e| AuditError::InvalidDate(format!("{end_date}: {e}")))?;

        let mut all_events = Vec::new();
        let mut current = start;
        while current <= end {
            all_events.extend(self.read_events(&current.format("%Y-%m-%d").to_string())?);
            current = current
                .succ_opt()
                .ok_or_else(|| AuditError::InvalidDate("date overflow".to_string()))?;
        }
        Ok(all_events)
    }
}

/// Helper macro for logging audit events.
///
/// Audit failures never fail the request; they are reported through
/// `tracing` instead.
#[macro_export]
macro_rules! audit_log {
    ($audit:expr, $event:expr) => {{
        if let Err(error) = $audit.log(&$event) {
            tracing::warn!(%error, "failed to append audit event");
        }
    }};
    ($audit:expr, $event_type:expr, $user:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id);
        $crate::audit_log!($audit, event);
    }};
    ($audit:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user(&$user.user_id)
            .with_resource($resource_type, $resource_id);
        $crate::audit_log!($audit, event);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditLog) {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(StoragePaths::new(temp.path()));
        (temp, log)
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::DepositApproved)
            .with_user("admin_1")
            .failed("balance write failed");

        assert!(!event.success);
        assert_eq!(event.error, Some("balance write failed".to_string()));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, log) = setup();

        log.log(
            &AuditEvent::new(AuditEventType::DepositSubmitted)
                .with_user("user_1")
                .with_resource("deposit", "dep_1"),
        )
        .unwrap();
        log.log(
            &AuditEvent::new(AuditEventType::PurchaseSettled)
                .with_user("user_1")
                .with_resource("catalog_item", "item_1")
                .with_details(serde_json::json!({ "price_coins": 300 })),
        )
        .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = log.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::DepositSubmitted);
        assert_eq!(events[1].event_type, AuditEventType::PurchaseSettled);
        assert_eq!(events[1].details.as_ref().unwrap()["price_coins"], 300);
    }

    #[test]
    fn missing_day_reads_as_empty() {
        let (_temp, log) = setup();
        assert!(log.read_events("2001-01-01").unwrap().is_empty());
    }

    #[test]
    fn range_rejects_bad_dates() {
        let (_temp, log) = setup();
        assert!(matches!(
            log.read_events_range("yesterday", "2026-01-01"),
            Err(AuditError::InvalidDate(_))
        ));
    }

    #[test]
    fn range_spans_days() {
        let (_temp, log) = setup();
        let mut old = AuditEvent::new(AuditEventType::AdminAccess).with_user("admin_1");
        old.timestamp = "2026-01-02T10:00:00Z".parse().unwrap();
        log.log(&old).unwrap();

        let events = log.read_events_range("2026-01-01", "2026-01-03").unwrap();
        assert_eq!(events.len(), 1);
        assert!(log
            .read_events_range("2026-01-03", "2026-01-04")
            .unwrap()
            .is_empty());
    }
}
