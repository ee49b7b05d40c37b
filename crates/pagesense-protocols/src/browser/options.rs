//! Options passed across the browser boundary.

use serde::{Deserialize, Serialize};

use crate::types::BoundingBox;

/// Encoded image format for screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

/// Screenshot capture options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Capture beyond the viewport.
    #[serde(default)]
    pub full_page: bool,
    /// Restrict the capture to a region (page coordinates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<BoundingBox>,
    /// Output format.
    #[serde(default)]
    pub format: ImageFormat,
    /// Compression quality (JPEG only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl ScreenshotOptions {
    /// Compressed viewport capture, used by the stability detector.
    pub fn jpeg(quality: u8) -> Self {
        Self {
            full_page: false,
            clip: None,
            format: ImageFormat::Jpeg,
            quality: Some(quality.min(100)),
        }
    }
}

/// Page viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
