// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the on-disk data layout.

use std::path::{Path, PathBuf};

/// Default data directory when `DATA_DIR` is not set.
pub const DATA_ROOT: &str = "./data";

/// Storage path utilities rooted at the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Row Store ==========

    /// Path to the embedded row database file.
    pub fn database_file(&self) -> PathBuf {
        self.root.join("market.redb")
    }

    // ========== Blob Paths ==========

    /// Directory containing all blob buckets.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Directory for one bucket.
    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.blobs_dir().join(bucket)
    }

    /// Path to a blob's bytes.
    pub fn blob(&self, bucket: &str, name: &str) -> PathBuf {
        self.bucket_dir(bucket).join(name)
    }

    /// Path to a blob's metadata sidecar.
    pub fn blob_meta(&self, bucket: &str, name: &str) -> PathBuf {
        self.blobs_dir()
            .join(".meta")
            .join(bucket)
            .join(format!("{name}.json"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
        assert_eq!(paths.database_file(), PathBuf::from("./data/market.redb"));
    }

    #[test]
    fn blob_paths_are_scoped_by_bucket() {
        let paths = StoragePaths::new("/srv/market");
        assert_eq!(
            paths.blob("logos", "abc.png"),
            PathBuf::from("/srv/market/blobs/logos/abc.png")
        );
        assert_eq!(
            paths.blob("payment-screenshots", "user_1/x.jpg"),
            PathBuf::from("/srv/market/blobs/payment-screenshots/user_1/x.jpg")
        );
        assert_eq!(
            paths.blob_meta("logos", "abc.png"),
            PathBuf::from("/srv/market/blobs/.meta/logos/abc.png.json")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::new("/srv/market");
        assert_eq!(paths.audit_dir(), PathBuf::from("/srv/market/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-18"),
            PathBuf::from("/srv/market/audit/2026-10-18/events.jsonl")
        );
    }
}
