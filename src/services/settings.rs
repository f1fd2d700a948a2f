// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment receiver settings.
//!
//! Plain key/value rows, last write wins. The deposit form reads them to
//! tell payers where to send money.

use serde::Serialize;
use utoipa::ToSchema;

use super::{discard_blobs, Backends, MarketError, MarketResult, Upload};
use crate::audit_log;
use crate::auth::AuthenticatedUser;
use crate::storage::{
    ensure_admin, generate_blob_name, AuditEvent, AuditEventType, Bucket, PaymentMethod, Setting,
    SettingsRepository,
};

const MAX_KEY_LEN: usize = 64;
const MAX_VALUE_LEN: usize = 1_000;

/// Where to pay for one payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentInstruction {
    pub method: PaymentMethod,
    pub display_name: String,
    /// Wallet number or UPI id, if configured.
    pub receiver: Option<String>,
    /// Public URL of the receiver QR image, if uploaded.
    pub qr_url: Option<String>,
}

/// Setting key holding the receiver identifier for `method`.
pub fn receiver_key(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Easypaisa => "easypaisa_number",
        PaymentMethod::JazzCash => "jazzcash_number",
        PaymentMethod::Upi => "upi_id",
    }
}

/// Setting key holding the QR blob name for `method`.
pub fn qr_key(method: PaymentMethod) -> String {
    format!("{}_qr", method.as_str())
}

fn validate_key(key: &str) -> MarketResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(MarketError::validation(format!(
            "setting key must match [a-z0-9_]{{1,{MAX_KEY_LEN}}}, got {key:?}"
        )));
    }
    Ok(())
}

pub struct SettingsService<'a> {
    backends: Backends<'a>,
}

impl<'a> SettingsService<'a> {
    pub fn new(backends: Backends<'a>) -> Self {
        Self { backends }
    }

    fn settings(&self) -> SettingsRepository<'a> {
        SettingsRepository::new(self.backends.rows)
    }

    /// Every setting, in key order. Readable by anyone.
    pub fn list(&self) -> MarketResult<Vec<Setting>> {
        Ok(self.settings().list()?)
    }

    /// Write a value (admin only). An empty value removes the key.
    pub fn set(
        &self,
        caller: &AuthenticatedUser,
        key: &str,
        value: &str,
    ) -> MarketResult<Option<Setting>> {
        ensure_admin(caller, "changing settings")?;
        validate_key(key)?;

        let value = value.trim();
        if value.chars().count() > MAX_VALUE_LEN {
            return Err(MarketError::validation(format!(
                "setting value must be at most {MAX_VALUE_LEN} characters"
            )));
        }

        let written = if value.is_empty() {
            self.settings().remove(key)?;
            None
        } else {
            Some(self.settings().set(key, value, Some(caller.user_id.as_str()))?)
        };

        tracing::info!(key, cleared = written.is_none(), "setting changed");
        audit_log!(
            self.backends.audit,
            AuditEventType::SettingChanged,
            caller,
            "setting",
            key
        );
        Ok(written)
    }

    /// Store a receiver QR image for `method` (admin only).
    ///
    /// The previous image is removed after the setting points at the new
    /// one.
    pub fn upload_qr(
        &self,
        caller: &AuthenticatedUser,
        method: PaymentMethod,
        image: Upload,
    ) -> MarketResult<Setting> {
        ensure_admin(caller, "uploading a payment QR code")?;
        image.ensure_image("QR image")?;

        let key = qr_key(method);
        let previous = self.settings().value(&key)?;

        let name = generate_blob_name(Some(method.as_str()), image.file_name.as_deref());
        self.backends
            .blobs
            .upload(Bucket::PaymentQr, &name, &image.bytes, &image.content_type)?;

        let setting = match self.settings().set(&key, &name, Some(caller.user_id.as_str())) {
            Ok(setting) => setting,
            Err(error) => {
                let cleanup =
                    discard_blobs(self.backends.blobs, Bucket::PaymentQr, std::slice::from_ref(&name));
                return Err(MarketError::Persistence {
                    reason: error.to_string(),
                    compensation: cleanup,
                });
            }
        };

        if let Some(previous) = previous.filter(|previous| *previous != name) {
            discard_blobs(self.backends.blobs, Bucket::PaymentQr, &[previous]);
        }

        tracing::info!(%method, blob = %name, "payment QR code replaced");
        audit_log!(
            self.backends.audit,
            AuditEvent::new(AuditEventType::SettingChanged)
                .with_user(&caller.user_id)
                .with_resource("setting", &key)
                .with_details(serde_json::json!({ "blob": name }))
        );
        Ok(setting)
    }

    /// Receiver details for every payment method, for the deposit form.
    pub fn payment_instructions(&self) -> MarketResult<Vec<PaymentInstruction>> {
        let settings = self.settings();
        PaymentMethod::ALL
            .into_iter()
            .map(|method| -> MarketResult<PaymentInstruction> {
                let qr_url = settings
                    .value(&qr_key(method))?
                    .map(|name| self.backends.blobs.public_url(Bucket::PaymentQr, &name));
                Ok(PaymentInstruction {
                    method,
                    display_name: method.display_name().to_string(),
                    receiver: settings.value(receiver_key(method))?,
                    qr_url,
                })
            })
            .collect()
    }
}
