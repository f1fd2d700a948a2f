// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blob storage for uploaded binary assets.
//!
//! Logos, plugin archives, payment screenshots and payment QR codes are
//! stored as opaque blobs in named buckets. Public buckets are served to
//! anyone; private buckets are only reachable through short-lived signed
//! URLs (HMAC-SHA256 over bucket, name and expiry).
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/blobs/
//!   {bucket}/{name}              # raw bytes
//!   .meta/{bucket}/{name}.json   # content type, size, upload time
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;

use super::StoragePaths;

type HmacSha256 = Hmac<Sha256>;

const MAX_NAME_LEN: usize = 255;
const MAX_EXTENSION_LEN: usize = 10;

/// Length of a generated URL signing key.
pub const SIGNING_KEY_LEN: usize = 32;

/// Blob buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    /// Catalog item logos (public).
    Logos,
    /// Downloadable plugin archives (private, signed URLs only).
    PluginFiles,
    /// Deposit payment proofs (private).
    PaymentScreenshots,
    /// Payment receiver QR codes shown on the deposit form (public).
    PaymentQr,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Logos,
        Bucket::PluginFiles,
        Bucket::PaymentScreenshots,
        Bucket::PaymentQr,
    ];

    /// Stable bucket name used in paths and URLs.
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Logos => "logos",
            Bucket::PluginFiles => "plugin-files",
            Bucket::PaymentScreenshots => "payment-screenshots",
            Bucket::PaymentQr => "payment-qr",
        }
    }

    /// Whether blobs in this bucket may be fetched without a signature.
    pub fn is_public(&self) -> bool {
        matches!(self, Bucket::Logos | Bucket::PaymentQr)
    }

    /// Parse a bucket from its URL name.
    pub fn from_name(name: &str) -> Option<Bucket> {
        Bucket::ALL.into_iter().find(|bucket| bucket.name() == name)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for blob operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    #[error("blob {bucket}/{name} not found")]
    NotFound { bucket: Bucket, name: String },

    #[error("blob I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("blob metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("signature is invalid or expired")]
    InvalidSignature,

    #[error("blob signing error: {0}")]
    Signing(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Blob bytes plus the content type recorded at upload.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// A time-limited retrieval URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Binary asset storage contract.
pub trait BlobStore: Send + Sync {
    /// Store bytes under `bucket/name`, replacing any previous blob.
    fn upload(&self, bucket: Bucket, name: &str, bytes: &[u8], content_type: &str)
        -> BlobResult<()>;

    /// Remove blobs. Names that do not exist are skipped.
    fn remove(&self, bucket: Bucket, names: &[String]) -> BlobResult<()>;

    /// Unsigned URL (only resolvable for public buckets).
    fn public_url(&self, bucket: Bucket, name: &str) -> String;

    /// URL that resolves until `ttl` has elapsed.
    fn signed_url(&self, bucket: Bucket, name: &str, ttl: Duration) -> BlobResult<SignedUrl>;

    /// Read a blob back.
    fn fetch(&self, bucket: Bucket, name: &str) -> BlobResult<StoredBlob>;

    /// Check a signature produced by [`BlobStore::signed_url`].
    fn verify_signature(
        &self,
        bucket: Bucket,
        name: &str,
        expires: i64,
        signature: &str,
    ) -> BlobResult<()>;
}

/// Validate a blob name: `/`-separated segments of `[A-Za-z0-9._-]`,
/// no empty, `.` or `..` segments.
pub fn validate_blob_name(name: &str) -> BlobResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    for segment in name.split('/') {
        let valid_chars = segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if segment.is_empty() || segment == "." || segment == ".." || !valid_chars {
            return Err(BlobError::InvalidName(name.to_string()));
        }
    }
    Ok(())
}

/// Generate a collision-resistant blob name, optionally scoped under a
/// prefix (an account id for payment screenshots).
///
/// The extension is taken from the client-supplied file name when it is
/// short and alphanumeric; anything else is dropped.
pub fn generate_blob_name(scope: Option<&str>, original_file_name: Option<&str>) -> String {
    let extension = original_file_name
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    let file = match extension {
        Some(ext) => format!("{}.{ext}", uuid::Uuid::new_v4()),
        None => uuid::Uuid::new_v4().to_string(),
    };

    match scope {
        Some(scope) => {
            let scope: String = scope
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            format!("{scope}/{file}")
        }
        None => file,
    }
}

/// Fresh random key for signing URLs, from the system CSPRNG.
pub fn generate_signing_key() -> BlobResult<Vec<u8>> {
    let mut key = vec![0u8; SIGNING_KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| BlobError::Signing("system random source unavailable".to_string()))?;
    Ok(key)
}

#[derive(Debug, Serialize, Deserialize)]
struct BlobMeta {
    content_type: String,
    size: u64,
    uploaded_at: DateTime<Utc>,
}

/// Filesystem-backed blob store with HMAC-signed retrieval URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    paths: StoragePaths,
    base_url: String,
    signing_key: Vec<u8>,
}

impl FsBlobStore {
    /// Create a blob store rooted at `paths`, producing URLs under `base_url`.
    pub fn new(paths: StoragePaths, base_url: impl Into<String>, signing_key: Vec<u8>) -> Self {
        Self {
            paths,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signing_key,
        }
    }

    /// Create every bucket directory. Safe to call multiple times.
    pub fn initialize(&self) -> BlobResult<()> {
        for bucket in Bucket::ALL {
            fs::create_dir_all(self.paths.bucket_dir(bucket.name()))?;
        }
        Ok(())
    }

    fn signature(&self, bucket: Bucket, name: &str, expires: i64) -> BlobResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| BlobError::Signing(e.to_string()))?;
        mac.update(bucket.name().as_bytes());
        mac.update(b"/");
        mac.update(name.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("upload-tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.flush()?;
        }
        fs::rename(&temp_path, path)
    }
}

impl BlobStore for FsBlobStore {
    fn upload(
        &self,
        bucket: Bucket,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> BlobResult<()> {
        validate_blob_name(name)?;

        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        Self::write_atomic(&self.paths.blob(bucket.name(), name), bytes)?;
        Self::write_atomic(
            &self.paths.blob_meta(bucket.name(), name),
            &serde_json::to_vec(&meta)?,
        )?;
        Ok(())
    }

    fn remove(&self, bucket: Bucket, names: &[String]) -> BlobResult<()> {
        for name in names {
            validate_blob_name(name)?;
            for path in [
                self.paths.blob(bucket.name(), name),
                self.paths.blob_meta(bucket.name(), name),
            ] {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, name: &str) -> String {
        format!("{}/blobs/{}/{}", self.base_url, bucket.name(), name)
    }

    fn signed_url(&self, bucket: Bucket, name: &str, ttl: Duration) -> BlobResult<SignedUrl> {
        validate_blob_name(name)?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| BlobError::Signing(e.to_string()))?;
        let expires_at = Utc::now() + ttl;
        let expires = expires_at.timestamp();

        let signature = self.signature(bucket, name, expires)?.finalize().into_bytes();
        let signature = Base64UrlUnpadded::encode_string(&signature);

        Ok(SignedUrl {
            url: format!(
                "{}?expires={expires}&signature={signature}",
                self.public_url(bucket, name)
            ),
            expires_at,
        })
    }

    fn fetch(&self, bucket: Bucket, name: &str) -> BlobResult<StoredBlob> {
        validate_blob_name(name)?;
        let bytes = match fs::read(self.paths.blob(bucket.name(), name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound {
                    bucket,
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = match fs::read(self.paths.blob_meta(bucket.name(), name)) {
            Ok(raw) => serde_json::from_slice::<BlobMeta>(&raw)?.content_type,
            Err(e) if e.kind() == io::ErrorKind::NotFound => "application/octet-stream".to_string(),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredBlob {
            bytes,
            content_type,
        })
    }

    fn verify_signature(
        &self,
        bucket: Bucket,
        name: &str,
        expires: i64,
        signature: &str,
    ) -> BlobResult<()> {
        if expires < Utc::now().timestamp() {
            return Err(BlobError::InvalidSignature);
        }
        let provided =
            Base64UrlUnpadded::decode_vec(signature).map_err(|_| BlobError::InvalidSignature)?;
        self.signature(bucket, name, expires)?
            .verify_slice(&provided)
            .map_err(|_| BlobError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_signing_keys_are_random() {
        let first = generate_signing_key().unwrap();
        let second = generate_signing_key().unwrap();
        assert_eq!(first.len(), SIGNING_KEY_LEN);
        assert_ne!(first, second);
    }

    fn store() -> (TempDir, FsBlobStore) {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(
            StoragePaths::new(temp.path()),
            "https://market.example/",
            b"test-signing-key".to_vec(),
        );
        store.initialize().unwrap();
        (temp, store)
    }

    fn query_param<'a>(url: &'a str, key: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{key}=")))
            .unwrap()
    }

    #[test]
    fn upload_then_fetch_keeps_content_type() {
        let (_temp, store) = store();
        store
            .upload(Bucket::Logos, "logo.png", b"png-bytes", "image/png")
            .unwrap();

        let blob = store.fetch(Bucket::Logos, "logo.png").unwrap();
        assert_eq!(blob.bytes, b"png-bytes");
        assert_eq!(blob.content_type, "image/png");
    }

    #[test]
    fn remove_skips_missing_names() {
        let (_temp, store) = store();
        store
            .upload(Bucket::PluginFiles, "a.jar", b"jar", "application/java-archive")
            .unwrap();

        store
            .remove(Bucket::PluginFiles, &["a.jar".to_string(), "gone.jar".to_string()])
            .unwrap();
        assert!(matches!(
            store.fetch(Bucket::PluginFiles, "a.jar"),
            Err(BlobError::NotFound { .. })
        ));
    }

    #[test]
    fn rejects_traversal_names() {
        let (_temp, store) = store();
        for name in ["../escape", "a//b", "", "/abs", "sp ace"] {
            assert!(
                matches!(
                    store.upload(Bucket::Logos, name, b"x", "text/plain"),
                    Err(BlobError::InvalidName(_))
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn public_url_strips_trailing_slash() {
        let (_temp, store) = store();
        assert_eq!(
            store.public_url(Bucket::Logos, "x.png"),
            "https://market.example/blobs/logos/x.png"
        );
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let (_temp, store) = store();
        let signed = store
            .signed_url(Bucket::PluginFiles, "p.jar", Duration::from_secs(60))
            .unwrap();

        let expires: i64 = query_param(&signed.url, "expires").parse().unwrap();
        let signature = query_param(&signed.url, "signature");
        assert_eq!(expires, signed.expires_at.timestamp());

        store
            .verify_signature(Bucket::PluginFiles, "p.jar", expires, signature)
            .expect("fresh signature verifies");
        assert!(store
            .verify_signature(Bucket::PluginFiles, "other.jar", expires, signature)
            .is_err());
        assert!(store
            .verify_signature(Bucket::PluginFiles, "p.jar", expires + 1, signature)
            .is_err());
        assert!(store
            .verify_signature(Bucket::PluginFiles, "p.jar", 1, signature)
            .is_err());
    }

    #[test]
    fn generated_names_are_scoped_and_sanitized() {
        let name = generate_blob_name(Some("user_1"), Some("Proof.JPG"));
        assert!(name.starts_with("user_1/"));
        assert!(name.ends_with(".jpg"));
        validate_blob_name(&name).unwrap();

        let odd = generate_blob_name(Some("a/b c"), Some("archive.tar gz"));
        assert!(odd.starts_with("a_b_c/"));
        assert!(!odd.contains(' '));
        validate_blob_name(&odd).unwrap();

        assert_ne!(generate_blob_name(None, None), generate_blob_name(None, None));
    }

    #[test]
    fn bucket_names_roundtrip() {
        for bucket in Bucket::ALL {
            assert_eq!(Bucket::from_name(bucket.name()), Some(bucket));
        }
        assert!(Bucket::Logos.is_public());
        assert!(!Bucket::PluginFiles.is_public());
        assert_eq!(Bucket::from_name(".meta"), None);
    }
}
