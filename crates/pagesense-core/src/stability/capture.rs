//! Screenshot capture raced against a timeout.

use image::RgbaImage;
use image::imageops::{self, FilterType};
use pagesense_config::StabilityConfig;
use pagesense_protocols::{BrowserError, PerceptionError, RemotePage, ScreenshotOptions, Viewport};
use tokio::time::timeout;
use tracing::warn;

use super::diff::blank_frame;

/// Captures downscaled comparison frames.
pub(crate) struct FrameCapture<'a> {
    config: &'a StabilityConfig,
    viewport: Viewport,
}

impl<'a> FrameCapture<'a> {
    pub(crate) fn new(config: &'a StabilityConfig, viewport: Viewport) -> Self {
        Self { config, viewport }
    }

    /// Capture one frame. A capture that outlives its timeout yields a
    /// blank frame instead of an error.
    pub(crate) async fn capture(
        &self,
        page: &dyn RemotePage,
        factor: u32,
    ) -> Result<RgbaImage, PerceptionError> {
        let limit = self.config.capture_timeout(factor);
        let options = ScreenshotOptions::jpeg(self.config.jpeg_quality);

        let bytes = match timeout(limit, page.screenshot(&options)).await {
            Ok(result) => result?,
            Err(_) => {
                let err = PerceptionError::CaptureTimeout(limit.as_millis() as u64);
                warn!(page = page.id(), "{}, comparing against a blank frame", err);
                return Ok(self.blank());
            }
        };

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| BrowserError::InvalidResponse(format!("screenshot decode: {}", e)))?
            .to_rgba8();
        Ok(self.downscale(decoded))
    }

    fn blank(&self) -> RgbaImage {
        let (w, h) = self.scaled(self.viewport.width, self.viewport.height);
        blank_frame(w, h)
    }

    fn downscale(&self, image: RgbaImage) -> RgbaImage {
        let (w, h) = self.scaled(image.width(), image.height());
        if (w, h) == image.dimensions() {
            return image;
        }
        imageops::resize(&image, w, h, FilterType::Triangle)
    }

    fn scaled(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.config.screenshot_scale.clamp(0.01, 1.0);
        let w = ((f64::from(width) * scale).round() as u32).max(1);
        let h = ((f64::from(height) * scale).round() as u32).max(1);
        (w, h)
    }
}
