//! OCR backend (C12 step 3): text extraction from a captured screenshot.
//! A native vision API would be selected on platforms that have one; this
//! crate ships the portable fallback, Tesseract, invoked as a subprocess
//! against the JPEG already written to disk. A missing backend is a fatal
//! startup error, not a per-capture one (§9 — capability interfaces
//! selected at startup).

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("tesseract binary not found on PATH")]
    BackendMissing,
    #[error("tesseract exited with status {0}")]
    NonZeroExit(i32),
    #[error("failed to run tesseract: {0}")]
    Spawn(#[from] std::io::Error),
}

#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Shells out to `tesseract <image> stdout`, matching the source's use of
/// Tesseract as the non-macOS fallback.
pub struct TesseractOcr;

impl TesseractOcr {
    /// Verify the binary is reachable. Call once at startup; a missing
    /// backend should abort the process rather than fail capture-by-capture.
    pub async fn detect() -> Result<Self, OcrError> {
        let status = Command::new("tesseract")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|_| OcrError::BackendMissing)?;
        if !status.success() {
            return Err(OcrError::BackendMissing);
        }
        Ok(TesseractOcr)
    }
}

#[async_trait]
impl OcrBackend for TesseractOcr {
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract").arg(image_path).arg("stdout").output().await?;
        if !output.status.success() {
            return Err(OcrError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Used by test builds and anywhere a backend is wired up without a real
/// Tesseract install; always returns empty text.
pub struct NullOcr;

#[async_trait]
impl OcrBackend for NullOcr {
    async fn extract_text(&self, _image_path: &Path) -> Result<String, OcrError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_backend_returns_empty_text() {
        let ocr = NullOcr;
        let text = ocr.extract_text(Path::new("/nonexistent.jpg")).await.unwrap();
        assert_eq!(text, "");
    }
}
