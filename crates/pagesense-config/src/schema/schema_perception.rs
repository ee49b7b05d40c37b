//! Perception configuration types (stability, scroll settle, segmentation).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Class names of carousel/slider/gallery libraries whose motion would
/// otherwise never let a page settle.
pub const DEFAULT_BANNED_CLASSES: &[&str] = &[
    "carousel",
    "carousel-inner",
    "slick-slider",
    "slick-track",
    "swiper",
    "swiper-container",
    "swiper-wrapper",
    "owl-carousel",
    "owl-stage",
    "glide",
    "glide__track",
    "splide",
    "flickity-slider",
    "keen-slider",
    "bx-wrapper",
    "flexslider",
    "tns-slider",
    "embla__container",
    "slideshow",
    "gallery",
    "marquee",
];

/// Visual stability detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Delay between the two screenshots of a comparison.
    #[serde(default = "default_pull_duration_ms")]
    pub pull_duration_ms: u64,

    /// Overall diff-loop budget, decremented by `pull_duration_ms` per iteration.
    #[serde(default = "default_stability_timeout_ms")]
    pub timeout_ms: u64,

    /// How long to wait for the page to leave about:blank.
    #[serde(default = "default_blank_page_timeout_ms")]
    pub blank_page_timeout_ms: u64,

    /// Base screenshot capture timeout, scaled by the retry factor.
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// Baseline is retaken while the white-pixel share exceeds this.
    #[serde(default = "default_white_pixel_ratio")]
    pub white_pixel_ratio: f64,

    /// Baseline retakes for all-white pages.
    #[serde(default = "default_white_retries")]
    pub white_retries: u32,

    /// Per-pixel color tolerance (0..1).
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: f64,

    /// A comparison under this mismatch percentage counts as unchanged.
    #[serde(default = "default_change_threshold_percent")]
    pub change_threshold_percent: f64,

    /// Consecutive unchanged comparisons needed to settle.
    #[serde(default = "default_stable_samples")]
    pub stable_samples: u32,

    /// Comparisons per attempt before the attempt counts as still changing.
    #[serde(default = "default_max_comparisons")]
    pub max_comparisons: u32,

    /// Still-changing attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Restarts allowed after the page navigates mid-measurement.
    #[serde(default = "default_flaky_retries")]
    pub flaky_retries: u32,

    /// Screenshot downscale factor before diffing.
    #[serde(default = "default_screenshot_scale")]
    pub screenshot_scale: f64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Images at most this wide are left uncovered.
    #[serde(default = "default_min_overlay_image_width")]
    pub min_overlay_image_width: f64,

    #[serde(default = "default_banned_classes")]
    pub banned_classes: Vec<String>,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            pull_duration_ms: default_pull_duration_ms(),
            timeout_ms: default_stability_timeout_ms(),
            blank_page_timeout_ms: default_blank_page_timeout_ms(),
            capture_timeout_ms: default_capture_timeout_ms(),
            white_pixel_ratio: default_white_pixel_ratio(),
            white_retries: default_white_retries(),
            pixel_threshold: default_pixel_threshold(),
            change_threshold_percent: default_change_threshold_percent(),
            stable_samples: default_stable_samples(),
            max_comparisons: default_max_comparisons(),
            max_attempts: default_max_attempts(),
            flaky_retries: default_flaky_retries(),
            screenshot_scale: default_screenshot_scale(),
            jpeg_quality: default_jpeg_quality(),
            min_overlay_image_width: default_min_overlay_image_width(),
            banned_classes: default_banned_classes(),
        }
    }
}

impl StabilityConfig {
    pub fn pull_duration(&self) -> Duration {
        Duration::from_millis(self.pull_duration_ms)
    }

    pub fn blank_page_timeout(&self) -> Duration {
        Duration::from_millis(self.blank_page_timeout_ms)
    }

    /// Capture timeout widened by the retry factor.
    pub fn capture_timeout(&self, factor: u32) -> Duration {
        Duration::from_millis(self.capture_timeout_ms.saturating_mul(u64::from(factor.max(1))))
    }
}

fn default_pull_duration_ms() -> u64 {
    100
}

fn default_stability_timeout_ms() -> u64 {
    10_000
}

fn default_blank_page_timeout_ms() -> u64 {
    5_000
}

fn default_capture_timeout_ms() -> u64 {
    3_000
}

fn default_white_pixel_ratio() -> f64 {
    0.98
}

fn default_white_retries() -> u32 {
    10
}

fn default_pixel_threshold() -> f64 {
    0.1
}

fn default_change_threshold_percent() -> f64 {
    1.0
}

fn default_stable_samples() -> u32 {
    3
}

fn default_max_comparisons() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    2
}

fn default_flaky_retries() -> u32 {
    2
}

fn default_screenshot_scale() -> f64 {
    0.5
}

fn default_jpeg_quality() -> u8 {
    50
}

fn default_min_overlay_image_width() -> f64 {
    50.0
}

fn default_banned_classes() -> Vec<String> {
    DEFAULT_BANNED_CLASSES.iter().map(|c| c.to_string()).collect()
}

/// Scroll settle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Scroll attempts before giving up.
    #[serde(default = "default_scroll_max_attempts")]
    pub max_attempts: u32,

    /// Growth of the document height per attempt above which loading is
    /// considered runaway.
    #[serde(default = "default_height_growth_limit_px")]
    pub height_growth_limit_px: f64,

    /// Wait after each scroll technique before measuring.
    #[serde(default = "default_scroll_settle_ms")]
    pub settle_ms: u64,

    /// Consecutive growing attempts that identify an infinite feed.
    #[serde(default = "default_growth_strikes")]
    pub growth_strikes: u32,

    /// Overall budget for one scroll settle.
    #[serde(default = "default_scroll_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_scroll_max_attempts(),
            height_growth_limit_px: default_height_growth_limit_px(),
            settle_ms: default_scroll_settle_ms(),
            growth_strikes: default_growth_strikes(),
            timeout_ms: default_scroll_timeout_ms(),
        }
    }
}

impl ScrollConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_scroll_max_attempts() -> u32 {
    10
}

fn default_height_growth_limit_px() -> f64 {
    1000.0
}

fn default_scroll_settle_ms() -> u64 {
    300
}

fn default_growth_strikes() -> u32 {
    3
}

fn default_scroll_timeout_ms() -> u64 {
    15_000
}

/// Segmentation heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Pointer-cursor composites smaller than this (both axes) collapse
    /// into one segment.
    #[serde(default = "default_collapse_max_size")]
    pub collapse_max_size: f64,

    /// SVGs at least this large (both axes) are images, smaller ones icons.
    #[serde(default = "default_large_svg_size")]
    pub large_svg_size: f64,

    /// Background images up to this size (both axes) are icons.
    #[serde(default = "default_icon_max_size")]
    pub icon_max_size: f64,

    /// Truncate segment text to this many characters; 0 disables.
    #[serde(default)]
    pub max_text_len: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            collapse_max_size: default_collapse_max_size(),
            large_svg_size: default_large_svg_size(),
            icon_max_size: default_icon_max_size(),
            max_text_len: 0,
        }
    }
}

fn default_collapse_max_size() -> f64 {
    200.0
}

fn default_large_svg_size() -> f64 {
    24.0
}

fn default_icon_max_size() -> f64 {
    48.0
}
