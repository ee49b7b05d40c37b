//! Outcome of a settle loop.

use serde::{Deserialize, Serialize};

/// Why a settle loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleReason {
    ReachedBottom,
    InfiniteScrollDetected,
    HeightGrowingTooFast,
    Timeout,
    MaxAttemptsExceeded,
    Changed,
    Unchanged,
}

impl SettleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettleReason::ReachedBottom => "reached_bottom",
            SettleReason::InfiniteScrollDetected => "infinite_scroll_detected",
            SettleReason::HeightGrowingTooFast => "height_growing_too_fast",
            SettleReason::Timeout => "timeout",
            SettleReason::MaxAttemptsExceeded => "max_attempts_exceeded",
            SettleReason::Changed => "changed",
            SettleReason::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for SettleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scroll position and document extent after a scroll settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScrollInfo {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
    /// Technique that produced movement, if any did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique: Option<String>,
    pub attempts: u32,
}

impl ScrollInfo {
    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.viewport_height >= self.scroll_height - 2.0
    }

    pub fn at_top(&self) -> bool {
        self.scroll_top <= 0.5
    }
}

/// Result of a stability or scroll-settle loop. Ephemeral.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityOutcome {
    pub settled: bool,
    pub reason: SettleReason,
    /// Mismatch percentage of the last comparison taken.
    pub sample_diff_percent: f64,
    pub scroll: Option<ScrollInfo>,
}

impl StabilityOutcome {
    pub fn new(settled: bool, reason: SettleReason, sample_diff_percent: f64) -> Self {
        Self {
            settled,
            reason,
            sample_diff_percent,
            scroll: None,
        }
    }

    pub fn with_scroll(mut self, scroll: ScrollInfo) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Caller-facing shape.
    pub fn to_result(&self) -> StabilityResult {
        StabilityResult {
            success: self.settled,
            reason: self.reason.as_str().to_string(),
            scroll_info: self.scroll.clone(),
        }
    }
}

/// Produced interface for callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityResult {
    pub success: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_info: Option<ScrollInfo>,
}
