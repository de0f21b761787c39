//! Edge Capture Loop (C12): periodic multi-screen capture, resize + JPEG
//! encode, bounded-concurrency OCR, local persistence. Screen enumeration
//! and bitmap acquisition are behind the [`ScreenCapture`] trait; the
//! platform permission plumbing to implement it for real displays is out
//! of scope (§1), so this crate ships only [`NullScreenCapture`], which
//! enumerates no screens and logs that capture is idle. A real backend is
//! wired in by implementing the trait and swapping the constructor call
//! in `main`.

use crate::ocr::OcrBackend;
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, RgbImage};
use memex_core::record::format_filename_timestamp;
use memex_core::{Record, RecordStore, VectorIndex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const MAX_LONG_EDGE: u32 = 1280;
const JPEG_QUALITY: u8 = 70;
const DEFAULT_MAX_CONCURRENT_OCR: usize = 4;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to grab screen {0}")]
    Grab(String),
}

/// One physical or virtual display.
#[derive(Debug, Clone)]
pub struct ScreenHandle {
    pub name: String,
}

#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn enumerate(&self) -> Vec<ScreenHandle>;
    async fn grab(&self, screen: &ScreenHandle) -> Result<RgbImage, CaptureError>;
}

/// No-op capture source: enumerates zero screens every tick. Screen
/// enumeration and bitmap acquisition require platform-specific
/// permission plumbing that is explicitly out of scope for this crate.
pub struct NullScreenCapture;

#[async_trait]
impl ScreenCapture for NullScreenCapture {
    async fn enumerate(&self) -> Vec<ScreenHandle> {
        Vec::new()
    }

    async fn grab(&self, screen: &ScreenHandle) -> Result<RgbImage, CaptureError> {
        Err(CaptureError::Grab(screen.name.clone()))
    }
}

pub struct CaptureLoopConfig {
    pub capture_interval: Duration,
    pub images_dir: PathBuf,
    pub max_concurrent_ocr: usize,
}

impl Default for CaptureLoopConfig {
    fn default() -> Self {
        CaptureLoopConfig {
            capture_interval: Duration::from_secs(60),
            images_dir: PathBuf::from("images"),
            max_concurrent_ocr: DEFAULT_MAX_CONCURRENT_OCR,
        }
    }
}

pub struct CaptureLoop {
    config: CaptureLoopConfig,
    screens: Arc<dyn ScreenCapture>,
    ocr: Arc<dyn OcrBackend>,
    store: Arc<RecordStore>,
    vector: Option<Arc<dyn VectorIndex>>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureLoop {
    pub fn new(
        config: CaptureLoopConfig,
        screens: Arc<dyn ScreenCapture>,
        ocr: Arc<dyn OcrBackend>,
        store: Arc<RecordStore>,
        vector: Option<Arc<dyn VectorIndex>>,
    ) -> Self {
        CaptureLoop { config, screens, ocr, store, vector, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    /// A clone-able handle other tasks can use to request shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_handle()` is set to `true`. Drains in-flight
    /// OCR tasks for up to [`SHUTDOWN_GRACE`] before returning.
    pub async fn run(&self) {
        tokio::fs::create_dir_all(&self.config.images_dir).await.ok();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_ocr.max(1)));
        let mut tasks = JoinSet::new();
        let mut interval = tokio::time::interval(self.config.capture_interval);

        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.tick(&semaphore, &mut tasks).await;
        }

        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
    }

    async fn tick(&self, semaphore: &Arc<Semaphore>, tasks: &mut JoinSet<()>) {
        let screens = self.screens.enumerate().await;
        if screens.is_empty() {
            tracing::debug!("no screens enumerated, skipping this capture tick");
            return;
        }

        for screen in screens {
            let image = match self.screens.grab(&screen).await {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("failed to grab {}: {e}", screen.name);
                    continue;
                }
            };

            let jpeg_path = match self.save_jpeg(&screen, image) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("failed to save screenshot for {}: {e}", screen.name);
                    continue;
                }
            };

            let semaphore = semaphore.clone();
            let ocr = self.ocr.clone();
            let store = self.store.clone();
            let vector = self.vector.clone();
            let screen_name = screen.name.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                let text = match ocr.extract_text(&jpeg_path).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("OCR failed for {}: {e}", jpeg_path.display());
                        String::new()
                    }
                };

                let mut record = Record::new(screen_name, text, Some("memex-edge".to_string()));
                record.screenshot_path = Some(jpeg_path.display().to_string());

                if let Err(e) = store.put(&record).await {
                    tracing::error!("failed to persist record {}: {e}", record.id);
                    return;
                }

                if !record.text.is_empty() {
                    if let Some(vector) = vector {
                        let meta = record.vector_metadata();
                        if let Err(e) = vector.upsert(vec![record.id.clone()], vec![record.text.clone()], vec![meta]).await {
                            tracing::warn!("vector upsert failed for {}: {e}", record.id);
                        }
                    }
                }
            });
        }
    }

    fn save_jpeg(&self, screen: &ScreenHandle, image: RgbImage) -> Result<PathBuf, image::ImageError> {
        let resized = resize_to_long_edge(image, MAX_LONG_EDGE);
        let now = chrono::Utc::now();
        let filename = format!("{}_{}.jpg", format_filename_timestamp(now), screen.name);
        let path = self.config.images_dir.join(filename);
        let mut encoded = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        encoder.encode_image(&DynamicImage::ImageRgb8(resized))?;
        std::fs::write(&path, encoded)?;
        Ok(path)
    }
}

fn resize_to_long_edge(image: RgbImage, max_long_edge: u32) -> RgbImage {
    let (width, height) = (image.width(), image.height());
    let long_edge = width.max(height);
    if long_edge <= max_long_edge {
        return image;
    }
    let scale = max_long_edge as f64 / long_edge as f64;
    let new_width = (width as f64 * scale).round().max(1.0) as u32;
    let new_height = (height as f64 * scale).round().max(1.0) as u32;
    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_preserves_aspect_and_caps_long_edge() {
        let image = RgbImage::new(2560, 1440);
        let resized = resize_to_long_edge(image, 1280);
        assert_eq!(resized.width(), 1280);
        assert_eq!(resized.height(), 720);
    }

    #[test]
    fn resize_is_a_no_op_under_the_cap() {
        let image = RgbImage::new(800, 600);
        let resized = resize_to_long_edge(image, 1280);
        assert_eq!(resized.width(), 800);
        assert_eq!(resized.height(), 600);
    }

    #[tokio::test]
    async fn a_tick_with_no_screens_enumerated_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureLoopConfig { images_dir: dir.path().to_path_buf(), ..Default::default() };
        let capture = CaptureLoop::new(
            config,
            Arc::new(NullScreenCapture),
            Arc::new(crate::ocr::NullOcr),
            Arc::new(RecordStore::new(dir.path().join("ocr"))),
            None,
        );
        let semaphore = Arc::new(Semaphore::new(1));
        let mut tasks = JoinSet::new();
        capture.tick(&semaphore, &mut tasks).await;
        assert_eq!(tasks.len(), 0);
    }
}
