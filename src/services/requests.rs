// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Feature request tickets.

use chrono::Utc;

use super::{required_text, Backends, MarketError, MarketResult};
use crate::audit_log;
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_admin, AuditEvent, AuditEventType, FeatureRequest, FeatureRequestRepository,
    OwnershipEnforcer, RequestStatus, RowStoreError, TransitionError,
};

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAX_TAG_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 5_000;
const MAX_VERSIONS: usize = 32;
const MAX_NOTE_LEN: usize = 1_000;

/// Fields of a new feature request.
#[derive(Debug, Clone, Default)]
pub struct NewRequest {
    pub requester_name: String,
    pub requester_email: String,
    pub target_name: String,
    pub platform: String,
    pub supported_versions: Vec<String>,
    pub category: String,
    pub description: String,
}

pub struct RequestTracker<'a> {
    backends: Backends<'a>,
}

impl<'a> RequestTracker<'a> {
    pub fn new(backends: Backends<'a>) -> Self {
        Self { backends }
    }

    fn requests(&self) -> FeatureRequestRepository<'a> {
        FeatureRequestRepository::new(self.backends.rows)
    }

    /// File a request for the caller. Every field is required.
    pub fn create(
        &self,
        caller: &AuthenticatedUser,
        new: NewRequest,
    ) -> MarketResult<FeatureRequest> {
        let requester_name = required_text("name", &new.requester_name, MAX_NAME_LEN)?;
        let requester_email = validate_email(&new.requester_email)?;
        let target_name = required_text("plugin name", &new.target_name, MAX_NAME_LEN)?;
        let platform = required_text("platform", &new.platform, MAX_TAG_LEN)?;
        let category = required_text("category", &new.category, MAX_TAG_LEN)?;
        let description = required_text("description", &new.description, MAX_DESCRIPTION_LEN)?;

        let supported_versions = new
            .supported_versions
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| required_text("version", v, MAX_TAG_LEN))
            .collect::<MarketResult<Vec<_>>>()?;
        if supported_versions.is_empty() {
            return Err(MarketError::validation(
                "at least one supported version is required",
            ));
        }
        if supported_versions.len() > MAX_VERSIONS {
            return Err(MarketError::validation(format!(
                "at most {MAX_VERSIONS} supported versions are allowed"
            )));
        }

        let now = Utc::now();
        let request = FeatureRequest {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: caller.user_id.clone(),
            requester_name,
            requester_email,
            target_name,
            platform,
            supported_versions,
            category,
            description,
            status: RequestStatus::Pending,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };
        self.requests().create(&request)?;

        tracing::info!(request_id = %request.id, account_id = %request.account_id, "feature request created");
        audit_log!(
            self.backends.audit,
            AuditEventType::FeatureRequestCreated,
            caller,
            "feature_request",
            &request.id
        );
        Ok(request)
    }

    /// All requests for admins, own requests otherwise; newest first.
    pub fn list(&self, caller: &AuthenticatedUser) -> MarketResult<Vec<FeatureRequest>> {
        let requests = if caller.is_admin() {
            self.requests().list_all()?
        } else {
            self.requests().list_by_account(&caller.user_id)?
        };
        Ok(requests)
    }

    pub fn get(&self, caller: &AuthenticatedUser, request_id: &str) -> MarketResult<FeatureRequest> {
        let request = self
            .requests()
            .get(request_id)?
            .ok_or_else(|| MarketError::not_found("feature request", request_id))?;
        request.verify_visible_to(caller, "feature request")?;
        Ok(request)
    }

    /// Move a request along its lifecycle (admin only).
    pub fn update_status(
        &self,
        caller: &AuthenticatedUser,
        request_id: &str,
        status: RequestStatus,
        note: Option<&str>,
    ) -> MarketResult<FeatureRequest> {
        ensure_admin(caller, "updating a feature request")?;

        let note = note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(|note| required_text("note", note, MAX_NOTE_LEN))
            .transpose()?;

        let updated = self
            .requests()
            .set_status(request_id, status, note.as_deref())
            .map_err(|error| match error {
                TransitionError::Conflict { current } if current.is_terminal() => {
                    MarketError::invalid_state(format!(
                        "feature request {request_id} is already {current}"
                    ))
                }
                TransitionError::Conflict { current } => MarketError::invalid_state(format!(
                    "feature request {request_id} cannot move from {current} to {status}"
                )),
                TransitionError::Store(RowStoreError::NotFound { .. }) => {
                    MarketError::not_found("feature request", request_id)
                }
                TransitionError::Store(e) => e.into(),
            })?;

        tracing::info!(request_id, %status, "feature request status changed");
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::FeatureRequestStatusChanged)
                .with_user(&caller.user_id)
                .with_resource("feature_request", request_id)
                .with_details(serde_json::json!({ "status": status }))
        );
        Ok(updated)
    }
}

/// Light structural check: `local@domain.tld`, no whitespace.
fn validate_email(raw: &str) -> MarketResult<String> {
    let email = required_text("email", raw, MAX_EMAIL_LEN)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(MarketError::validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{admin, user, Fixture};

    fn new_request() -> NewRequest {
        NewRequest {
            requester_name: "Alex".to_string(),
            requester_email: "alex@example.com".to_string(),
            target_name: "LuckPerms".to_string(),
            platform: "velocity".to_string(),
            supported_versions: vec!["1.20".to_string(), " 1.21 ".to_string()],
            category: "permissions".to_string(),
            description: "Port to Velocity".to_string(),
        }
    }

    #[test]
    fn create_and_scope_listing() {
        let fx = Fixture::new();
        let tracker = RequestTracker::new(fx.backends());

        let mine = tracker.create(&user("user_1"), new_request()).unwrap();
        assert_eq!(mine.status, RequestStatus::Pending);
        assert_eq!(mine.supported_versions, vec!["1.20", "1.21"]);
        tracker.create(&user("user_2"), new_request()).unwrap();

        let own = tracker.list(&user("user_1")).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, mine.id);
        assert_eq!(tracker.list(&admin()).unwrap().len(), 2);

        assert!(matches!(
            tracker.get(&user("user_2"), &mine.id),
            Err(MarketError::Authorization(_))
        ));
        tracker.get(&admin(), &mine.id).unwrap();
    }

    #[test]
    fn create_validates_fields() {
        let fx = Fixture::new();
        let tracker = RequestTracker::new(fx.backends());

        let mut no_versions = new_request();
        no_versions.supported_versions = vec!["  ".to_string()];
        let mut bad_email = new_request();
        bad_email.requester_email = "alex.example.com".to_string();
        let mut no_category = new_request();
        no_category.category = String::new();

        for new in [no_versions, bad_email, no_category] {
            assert!(matches!(
                tracker.create(&user("user_1"), new),
                Err(MarketError::Validation(_))
            ));
        }
    }

    #[test]
    fn status_follows_the_lifecycle() {
        let fx = Fixture::new();
        let tracker = RequestTracker::new(fx.backends());
        let request = tracker.create(&user("user_1"), new_request()).unwrap();

        let started = tracker
            .update_status(&admin(), &request.id, RequestStatus::InProgress, Some("on it"))
            .unwrap();
        assert_eq!(started.status, RequestStatus::InProgress);
        assert_eq!(started.admin_note.as_deref(), Some("on it"));
        assert!(started.updated_at >= request.updated_at);

        assert!(matches!(
            tracker.update_status(&admin(), &request.id, RequestStatus::Rejected, None),
            Err(MarketError::InvalidState(_))
        ));

        let done = tracker
            .update_status(&admin(), &request.id, RequestStatus::Completed, None)
            .unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert_eq!(done.admin_note.as_deref(), Some("on it"));

        for next in RequestStatus::ALL {
            assert!(matches!(
                tracker.update_status(&admin(), &request.id, next, None),
                Err(MarketError::InvalidState(message)) if message.ends_with("is already completed")
            ));
        }
    }

    #[test]
    fn status_updates_need_admin_and_a_request() {
        let fx = Fixture::new();
        let tracker = RequestTracker::new(fx.backends());
        let request = tracker.create(&user("user_1"), new_request()).unwrap();

        assert!(matches!(
            tracker.update_status(&user("user_1"), &request.id, RequestStatus::Rejected, None),
            Err(MarketError::Authorization(_))
        ));
        assert!(matches!(
            tracker.update_status(&admin(), "missing", RequestStatus::Rejected, None),
            Err(MarketError::NotFound { .. })
        ));
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a b@c.io").is_err());
        assert!(validate_email("a@b@c.io").is_err());
    }
}
