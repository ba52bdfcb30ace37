//! Image text extraction via the Tesseract CLI
//!
//! Runs `tesseract <image> stdout` as a child process with a timeout. The
//! child is killed when the timeout fires.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::error::ApiError;

const OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Shortest OCR line kept when comments are not parsed by the language model
pub const MIN_LINE_CHARS: usize = 3;

/// OCR errors
#[derive(Debug, Error)]
pub enum OcrError {
    /// Tesseract binary not found in PATH
    #[error("Tesseract binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to spawn or wait on the OCR process
    #[error("Failed to execute Tesseract: {0}")]
    ExecutionError(String),

    /// Tesseract exited with an error
    #[error("Tesseract failed: {0}")]
    ExtractionFailed(String),

    /// Tesseract did not finish in time
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    /// Image not found at path
    #[error("Image file not found: {0}")]
    FileNotFound(String),
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Timeout(_) => ApiError::request_timeout("OCR timed out"),
            other => {
                tracing::error!("OCR failed: {}", other);
                ApiError::internal("Failed to extract text from image")
            }
        }
    }
}

/// Extracts raw text from an image file
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Tesseract command-line client
pub struct TesseractClient {
    binary_path: String,
    timeout: Duration,
}

impl TesseractClient {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: OCR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::BinaryNotFound(self.binary_path.clone())
        } else {
            OcrError::ExecutionError(e.to_string())
        }
    }

    /// Check that the binary can be executed
    pub async fn check_available(&self) -> Result<(), OcrError> {
        let version_check = Command::new(&self.binary_path)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, version_check).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.spawn_error(e)),
            Err(_) => Err(OcrError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractClient {
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
        if !image_path.exists() {
            return Err(OcrError::FileNotFound(image_path.display().to_string()));
        }

        tracing::debug!(image = %image_path.display(), "Running Tesseract");

        // Dropping the output future on timeout kills the child
        let run = Command::new(&self.binary_path)
            .arg(image_path)
            .arg("stdout")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                tracing::warn!(timeout = ?self.timeout, "Tesseract timed out, killing process");
                OcrError::Timeout(self.timeout)
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ExtractionFailed(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(chars = text.len(), "OCR completed");
        Ok(text)
    }
}

/// Fallback segmentation: one text per non-empty line of at least three characters
pub fn split_lines(ocr_text: &str) -> Vec<String> {
    ocr_text
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .map(str::to_string)
        .collect()
}
