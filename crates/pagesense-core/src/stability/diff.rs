//! Pixel comparison.
//!
//! Per-pixel difference is measured in YIQ space against a squared
//! tolerance, after blending each pixel onto white.

use image::{Rgba, RgbaImage};

/// Largest possible YIQ delta between two pixels.
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Percentage (0..=100) of pixels differing by more than `threshold`
/// (0..1). Frames of different sizes count as entirely changed.
pub(crate) fn mismatch_percent(a: &RgbaImage, b: &RgbaImage, threshold: f64) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 100.0;
    }
    let total = u64::from(a.width()) * u64::from(a.height());
    if total == 0 {
        return 0.0;
    }

    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let mismatched = a
        .pixels()
        .zip(b.pixels())
        .filter(|(p, q)| p != q && color_delta(p, q) > max_delta)
        .count() as u64;

    mismatched as f64 * 100.0 / total as f64
}

/// Share (0..=1) of pure white pixels.
pub(crate) fn white_ratio(image: &RgbaImage) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 1.0;
    }
    let white = image
        .pixels()
        .filter(|p| p[0] == 255 && p[1] == 255 && p[2] == 255)
        .count() as u64;
    white as f64 / total as f64
}

/// Stand-in for a capture that timed out.
pub(crate) fn blank_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255]))
}

fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let (r1, g1, b1) = blend(a);
    let (r2, g2, b2) = blend(b);

    let y = rgb2y(r1, g1, b1) - rgb2y(r2, g2, b2);
    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);

    0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q
}

fn blend(p: &Rgba<u8>) -> (f64, f64, f64) {
    let alpha = f64::from(p[3]) / 255.0;
    let mix = |c: u8| 255.0 + (f64::from(c) - 255.0) * alpha;
    (mix(p[0]), mix(p[1]), mix(p[2]))
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}
