// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into
//! [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the database, blobs and audit log | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | Origin used in blob URLs | `http://localhost:{PORT}` |
//! | `BLOB_SIGNING_KEY` | HMAC key for signed blob URLs (≥ 32 bytes) | Random per process |
//! | `DOWNLOAD_LINK_TTL_SECS` | Lifetime of plugin download links | `60` |
//! | `MAX_UPLOAD_BYTES` | Request body limit for uploads | `52428800` |
//! | `CLERK_JWKS_URL` | Clerk JWKS endpoint for JWT verification | Required for production |
//! | `CLERK_ISSUER` | Expected JWT issuer claim | Optional |
//! | `CLERK_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; HTTPS when both set | Plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const BLOB_SIGNING_KEY_ENV: &str = "BLOB_SIGNING_KEY";
pub const DOWNLOAD_LINK_TTL_ENV: &str = "DOWNLOAD_LINK_TTL_SECS";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const CLERK_JWKS_URL_ENV: &str = "CLERK_JWKS_URL";
pub const CLERK_ISSUER_ENV: &str = "CLERK_ISSUER";
pub const CLERK_AUDIENCE_ENV: &str = "CLERK_AUDIENCE";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DOWNLOAD_LINK_TTL_SECS: u64 = 60;
/// 50 MiB: plugin archives are the largest uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const MIN_SIGNING_KEY_LEN: usize = 32;

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid {expected}: {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),

    #[error("BLOB_SIGNING_KEY must be at least {MIN_SIGNING_KEY_LEN} bytes")]
    WeakSigningKey,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Clerk verification settings. `jwks_url = None` selects development mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClerkConfig {
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    /// `None` means a random key is generated at startup, so signed links
    /// do not survive a restart.
    pub blob_signing_key: Option<Vec<u8>>,
    pub download_link_ttl: Duration,
    pub max_upload_bytes: usize,
    pub clerk: ClerkConfig,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(get(PORT_ENV), PORT_ENV, "port number", DEFAULT_PORT)?;
        let ttl_secs = parse_or(
            get(DOWNLOAD_LINK_TTL_ENV),
            DOWNLOAD_LINK_TTL_ENV,
            "number of seconds",
            DEFAULT_DOWNLOAD_LINK_TTL_SECS,
        )?;
        if ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                var: DOWNLOAD_LINK_TTL_ENV,
                expected: "positive number of seconds",
                value: ttl_secs.to_string(),
            });
        }
        let max_upload_bytes = parse_or(
            get(MAX_UPLOAD_BYTES_ENV),
            MAX_UPLOAD_BYTES_ENV,
            "byte count",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        let public_base_url = match get(PUBLIC_BASE_URL_ENV) {
            Some(raw) => {
                let parsed = url::Url::parse(&raw).map_err(|_| ConfigError::Invalid {
                    var: PUBLIC_BASE_URL_ENV,
                    expected: "URL",
                    value: raw.clone(),
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid {
                        var: PUBLIC_BASE_URL_ENV,
                        expected: "http(s) URL",
                        value: raw,
                    });
                }
                raw.trim_end_matches('/').to_string()
            }
            None => format!("http://localhost:{port}"),
        };

        let blob_signing_key = match get(BLOB_SIGNING_KEY_ENV) {
            Some(key) if key.len() < MIN_SIGNING_KEY_LEN => return Err(ConfigError::WeakSigningKey),
            Some(key) => Some(key.into_bytes()),
            None => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Incomplete(TLS_KEY_PATH_ENV, TLS_CERT_PATH_ENV)),
            (None, None) => None,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    expected: "log format (json or pretty)",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()).into(),
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            public_base_url,
            blob_signing_key,
            download_link_ttl: Duration::from_secs(ttl_secs),
            max_upload_bytes,
            clerk: ClerkConfig {
                jwks_url: get(CLERK_JWKS_URL_ENV),
                issuer: get(CLERK_ISSUER_ENV),
                audience: get(CLERK_AUDIENCE_ENV),
            },
            tls,
            log_format,
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value: raw,
        }),
        None => Ok(default),
    }
}
