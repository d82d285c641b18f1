use std::collections::HashMap;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart,
    },
    http::StatusCode,
};
use bytes::Bytes;
use tracing::debug;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// A fully buffered multipart form: file parts by field name plus text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

fn upload_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("Upload exceeds the allowed size.".to_string())
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

impl UploadForm {
    /// Buffers every part of the request. A request that is not multipart at
    /// all reads as an empty form, so handlers report the missing file.
    pub async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        let mut multipart = match multipart {
            Ok(m) => m,
            Err(rejection) => {
                debug!("Request is not a multipart form: {rejection}");
                return Ok(form);
            }
        };

        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(upload_error)?;
                    // Browsers submit an empty, nameless part when no file was chosen
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { filename, bytes });
                }
                None => {
                    let value = field.text().await.map_err(upload_error)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// A trimmed, non-empty text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
