//! Multipart upload handling
//!
//! The file extension is checked as soon as the part header arrives and the
//! size limit while the body streams in, so a rejected upload never reaches
//! disk or an external service. Accepted bytes are written to a uniquely
//! named temp file that is removed when its [`TempUpload`] guard drops.

use axum::extract::multipart::{Multipart, MultipartError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ApiError;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Which upload endpoint a file arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Csv,
    Image,
}

impl UploadKind {
    /// Temp file prefix and storage folder name
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Csv => "csv",
            UploadKind::Image => "image",
        }
    }

    /// Lower-cased extension of `file_name` if this kind accepts it
    pub fn validate_extension(&self, file_name: &str) -> Result<String, ApiError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match self {
            UploadKind::Csv if extension == "csv" => Ok(extension),
            UploadKind::Csv => Err(ApiError::bad_request("Only CSV files are allowed")),
            UploadKind::Image if IMAGE_EXTENSIONS.contains(&extension.as_str()) => Ok(extension),
            UploadKind::Image => Err(ApiError::bad_request(
                "Only image files (JPG, PNG, GIF, BMP, WEBP) are allowed",
            )),
        }
    }
}

/// File part of a multipart request
#[derive(Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Every part of a multipart request: the file plus plain text fields
#[derive(Debug, Default)]
pub struct MultipartUpload {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl MultipartUpload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Form booleans: `true`/`1`/`yes`/`on`; absent or blank gives `default`
    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.field(name).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if !v.is_empty() => matches!(v.as_str(), "true" | "1" | "yes" | "on"),
            _ => default,
        }
    }

    pub fn require_file(self) -> Result<(UploadedFile, HashMap<String, String>), ApiError> {
        match self.file {
            Some(file) => Ok((file, self.fields)),
            None => Err(ApiError::bad_request("No file uploaded")),
        }
    }
}

fn too_large(max_bytes: u64) -> ApiError {
    ApiError::payload_too_large(format!(
        "File too large (max {}MB)",
        max_bytes / (1024 * 1024)
    ))
}

fn multipart_error(err: MultipartError, max_bytes: u64) -> ApiError {
    if err.status().as_u16() == 413 {
        too_large(max_bytes)
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Read all parts, validating the first file part against `kind` and `max_bytes`
pub async fn read_multipart(
    multipart: &mut Multipart,
    kind: UploadKind,
    max_bytes: u64,
) -> Result<MultipartUpload, ApiError> {
    let mut upload = MultipartUpload::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?;
            upload.fields.insert(name, value);
            continue;
        };

        if upload.file.is_some() {
            tracing::debug!(field = %name, "Ignoring extra file part");
            continue;
        }

        let extension = kind.validate_extension(&file_name)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                tracing::warn!(file = %file_name, max_bytes, "Upload exceeds size limit");
                return Err(too_large(max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(file = %file_name, bytes = bytes.len(), "Received upload");

        upload.file = Some(UploadedFile {
            original_name: file_name,
            extension,
            bytes,
        });
    }

    Ok(upload)
}

/// Temp copy of an upload, deleted on drop
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `bytes` to `<dir>/<kind>-<millis>-<uuid>.<ext>`
    pub async fn write(
        dir: &Path,
        kind: UploadKind,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Self, ApiError> {
        tokio::fs::create_dir_all(dir).await?;

        let file_name = format!(
            "{}-{}-{}.{}",
            kind.as_str(),
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension
        );
        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed temp upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "Failed to remove temp upload: {}", e),
        }
    }
}
