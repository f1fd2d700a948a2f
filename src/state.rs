// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthError, JwksManager};
use crate::config::{AppConfig, ClerkConfig};
use crate::services::{
    Backends, CatalogService, DownloadGate, LedgerService, RequestTracker, SettingsService,
    StatsService, DEFAULT_LINK_TTL,
};
use crate::storage::{AuditLog, BlobStore, RowStore, StoragePaths};

/// Authentication configuration.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// JWKS manager for production mode; `None` enables development mode.
    pub jwks: Option<Arc<JwksManager>>,
    /// Expected `iss` claim.
    pub issuer: Option<String>,
    /// Expected `aud` claim.
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn from_clerk(clerk: &ClerkConfig) -> Result<Self, AuthError> {
        let jwks = match &clerk.jwks_url {
            Some(url) => Some(Arc::new(JwksManager::new(url.clone())?)),
            None => None,
        };
        Ok(Self {
            jwks,
            issuer: clerk.issuer.clone(),
            audience: clerk.audience.clone(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.jwks.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub rows: Arc<dyn RowStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub audit: Arc<AuditLog>,
    pub paths: StoragePaths,
    pub download_ttl: Duration,
    pub max_upload_bytes: usize,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(rows: Arc<dyn RowStore>, blobs: Arc<dyn BlobStore>, paths: StoragePaths) -> Self {
        Self {
            rows,
            blobs,
            audit: Arc::new(AuditLog::new(paths.clone())),
            paths,
            download_ttl: DEFAULT_LINK_TTL,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
            auth_config: AuthConfig::default(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    /// Apply the tunables from `config`.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.download_ttl = config.download_link_ttl;
        self.max_upload_bytes = config.max_upload_bytes;
        self
    }

    pub fn backends(&self) -> Backends<'_> {
        Backends {
            rows: self.rows.as_ref(),
            blobs: self.blobs.as_ref(),
            audit: &self.audit,
        }
    }

    pub fn ledger(&self) -> LedgerService<'_> {
        LedgerService::new(self.backends())
    }

    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.backends())
    }

    pub fn downloads(&self) -> DownloadGate<'_> {
        DownloadGate::new(self.backends(), self.download_ttl)
    }

    pub fn requests(&self) -> RequestTracker<'_> {
        RequestTracker::new(self.backends())
    }

    pub fn settings(&self) -> SettingsService<'_> {
        SettingsService::new(self.backends())
    }

    pub fn stats(&self) -> StatsService<'_> {
        StatsService::new(self.backends())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{FsBlobStore, RedbStore};
    use tempfile::TempDir;

    /// State over a real redb database and blob directory in a temp dir.
    pub(crate) fn test_state() -> (AppState, TempDir) {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let rows = RedbStore::open(&paths.database_file()).unwrap();
        let blobs = FsBlobStore::new(paths.clone(), "http://localhost:8080", b"test-key".to_vec());
        blobs.initialize().unwrap();
        (AppState::new(Arc::new(rows), Arc::new(blobs), paths), temp)
    }

    #[test]
    fn development_mode_without_jwks() {
        let auth = AuthConfig::from_clerk(&ClerkConfig::default()).unwrap();
        assert!(!auth.is_production());
    }

    #[test]
    fn jwks_must_be_https() {
        let clerk = ClerkConfig {
            jwks_url: Some("http://clerk.example/jwks".to_string()),
            ..ClerkConfig::default()
        };
        assert!(AuthConfig::from_clerk(&clerk).is_err());
    }

    #[test]
    fn config_tunables_apply() {
        let (state, _temp) = test_state();
        let config = AppConfig::from_lookup(|var| match var {
            "DOWNLOAD_LINK_TTL_SECS" => Some("30".to_string()),
            "MAX_UPLOAD_BYTES" => Some("1024".to_string()),
            _ => None,
        })
        .unwrap();

        let state = state.with_config(&config);
        assert_eq!(state.download_ttl, Duration::from_secs(30));
        assert_eq!(state.max_upload_bytes, 1024);
    }
}
