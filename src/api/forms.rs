// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multipart form parsing shared by the upload endpoints.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::services::Upload;

/// A fully buffered multipart body: text fields and files by field name.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<Upload>>,
}

impl Form {
    /// Buffer every part. File inputs left empty by the browser are skipped.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Form::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        ApiError::bad_request(format!("failed to read file {name}: {e}"))
                    })?;
                    if bytes.is_empty() && file_name.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(Upload::new(
                        Some(&file_name),
                        &content_type,
                        bytes.to_vec(),
                    ));
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        ApiError::bad_request(format!("failed to read field {name}: {e}"))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text field, or an empty string when absent.
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    /// Non-blank text field.
    pub fn non_blank(&self, name: &str) -> Option<String> {
        self.text(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Parse a field if present and non-blank.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.non_blank(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("invalid value for {name}: {raw:?}"))),
            None => Ok(None),
        }
    }

    /// First file uploaded under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            return None;
        }
        Some(files.remove(0))
    }

    /// Every file uploaded under `name`, in order.
    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        self.files.remove(name).unwrap_or_default()
    }
}
