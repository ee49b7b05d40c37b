//! Scroll settle: scroll, then compare scroll position and document height
//! instead of pixels.

use std::str::FromStr;

use pagesense_protocols::{
    PerceptionError, RemotePage, ScrollInfo, SettleReason, StabilityOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{PageSource, StabilityDetector, pause};

pub(crate) const SCROLL_METRICS_SCRIPT: &str = r#"() => {
  const root = document.scrollingElement || document.documentElement;
  const body = document.body;
  return {
    scrollTop: window.scrollY || root.scrollTop || (body ? body.scrollTop : 0) || 0,
    scrollHeight: Math.max(root.scrollHeight, body ? body.scrollHeight : 0),
    viewportHeight: window.innerHeight,
  };
}"#;

pub(crate) const SCROLL_SCRIPT: &str = r#"(technique, target) => {
  if (technique === 'scrollTo') {
    window.scrollTo(0, target);
  } else if (technique === 'documentElement') {
    document.documentElement.scrollTop = target;
  } else if (technique === 'body' && document.body) {
    document.body.scrollTop = target;
  }
  return null;
}"#;

/// Where to scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Top,
    Bottom,
    /// One viewport down.
    Next,
}

impl FromStr for ScrollDirection {
    type Err = PerceptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(ScrollDirection::Top),
            "bottom" => Ok(ScrollDirection::Bottom),
            "next" => Ok(ScrollDirection::Next),
            other => Err(PerceptionError::InvalidInput(format!(
                "unknown scroll direction: {}",
                other
            ))),
        }
    }
}

/// Scroll techniques, least invasive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Technique {
    ScrollTo,
    DocumentElement,
    Body,
    Wheel,
}

impl Technique {
    const ALL: [Technique; 4] = [
        Technique::ScrollTo,
        Technique::DocumentElement,
        Technique::Body,
        Technique::Wheel,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Technique::ScrollTo => "scrollTo",
            Technique::DocumentElement => "documentElement",
            Technique::Body => "body",
            Technique::Wheel => "wheel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollMetrics {
    scroll_top: f64,
    scroll_height: f64,
    viewport_height: f64,
}

impl ScrollMetrics {
    fn info(&self, technique: Option<Technique>, attempts: u32) -> ScrollInfo {
        ScrollInfo {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height,
            viewport_height: self.viewport_height,
            technique: technique.map(|t| t.as_str().to_string()),
            attempts,
        }
    }

    fn moved_from(&self, before: &ScrollMetrics) -> bool {
        (self.scroll_top - before.scroll_top).abs() > 0.5
    }

    fn grew_from(&self, before: &ScrollMetrics) -> bool {
        self.scroll_height - before.scroll_height > 0.5
    }
}

async fn read_metrics(page: &dyn RemotePage) -> Result<ScrollMetrics, PerceptionError> {
    let value = page.evaluate(SCROLL_METRICS_SCRIPT, Vec::new()).await?;
    Ok(serde_json::from_value(value)?)
}

impl StabilityDetector {
    /// Scroll to the top and wait for the position to settle.
    pub async fn scroll_top(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
    ) -> Result<StabilityOutcome, PerceptionError> {
        self.wait_until_stable_for_scroll(source, ScrollDirection::Top, cancel)
            .await
    }

    /// Scroll to the bottom, following lazily loaded content, and wait for
    /// the position to settle.
    pub async fn scroll_bottom(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
    ) -> Result<StabilityOutcome, PerceptionError> {
        self.wait_until_stable_for_scroll(source, ScrollDirection::Bottom, cancel)
            .await
    }

    /// Scroll one viewport down and wait for the position to settle.
    pub async fn scroll_next(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
    ) -> Result<StabilityOutcome, PerceptionError> {
        self.wait_until_stable_for_scroll(source, ScrollDirection::Next, cancel)
            .await
    }

    /// Scroll in `direction` until the position settles.
    ///
    /// Each attempt tries the techniques in order until one moves the page.
    /// Documents that grow by more than `height_growth_limit_px` in one
    /// attempt, or keep growing for `growth_strikes` attempts in a row,
    /// are reported as runaway or infinite feeds instead of being followed.
    pub async fn wait_until_stable_for_scroll(
        &self,
        source: &dyn PageSource,
        direction: ScrollDirection,
        cancel: &CancellationToken,
    ) -> Result<StabilityOutcome, PerceptionError> {
        let page = source.resolve().await?;
        let deadline = Instant::now() + self.scroll.timeout();
        let mut metrics = read_metrics(page.as_ref()).await?;
        let mut technique = None;
        let mut moved_any = false;
        let mut strikes = 0;

        let finish = |settled: bool,
                      reason: SettleReason,
                      metrics: &ScrollMetrics,
                      technique: Option<Technique>,
                      attempts: u32|
         -> Result<StabilityOutcome, PerceptionError> {
            info!(
                page = page.id(),
                direction = ?direction,
                reason = %reason,
                scroll_top = metrics.scroll_top,
                scroll_height = metrics.scroll_height,
                "Scroll settled"
            );
            Ok(StabilityOutcome::new(settled, reason, 0.0)
                .with_scroll(metrics.info(technique, attempts)))
        };

        if direction == ScrollDirection::Top && metrics.scroll_top <= 0.5 {
            return finish(true, SettleReason::Unchanged, &metrics, None, 0);
        }

        for attempt in 1..=self.scroll.max_attempts.max(1) {
            if Instant::now() >= deadline {
                return finish(false, SettleReason::Timeout, &metrics, technique, attempt - 1);
            }

            let before = metrics;
            let target = match direction {
                ScrollDirection::Top => 0.0,
                ScrollDirection::Bottom => before.scroll_height,
                ScrollDirection::Next => before.scroll_top + before.viewport_height,
            };

            let (after, used) = self.scroll_once(page.as_ref(), &before, target, cancel).await?;
            metrics = after;
            if used.is_some() {
                technique = used;
            }
            let moved = after.moved_from(&before);
            moved_any |= moved;
            let growth = after.scroll_height - before.scroll_height;
            trace!(attempt, growth, moved, top = after.scroll_top, "Scroll attempt");

            if growth > self.scroll.height_growth_limit_px {
                return finish(false, SettleReason::HeightGrowingTooFast, &metrics, technique, attempt);
            }

            let info = metrics.info(technique, attempt);
            match direction {
                ScrollDirection::Top => {
                    if info.at_top() {
                        let reason = if moved_any {
                            SettleReason::Changed
                        } else {
                            SettleReason::Unchanged
                        };
                        return finish(true, reason, &metrics, technique, attempt);
                    }
                }
                ScrollDirection::Next => {
                    if moved {
                        return finish(true, SettleReason::Changed, &metrics, technique, attempt);
                    }
                    if info.at_bottom() {
                        return finish(true, SettleReason::ReachedBottom, &metrics, technique, attempt);
                    }
                }
                ScrollDirection::Bottom => {
                    if after.grew_from(&before) {
                        strikes += 1;
                        debug!(strikes, growth, "Document grew while scrolling");
                        if strikes >= self.scroll.growth_strikes {
                            return finish(
                                false,
                                SettleReason::InfiniteScrollDetected,
                                &metrics,
                                technique,
                                attempt,
                            );
                        }
                        continue;
                    }
                    strikes = 0;
                    if info.at_bottom() {
                        return finish(true, SettleReason::ReachedBottom, &metrics, technique, attempt);
                    }
                }
            }
        }

        finish(
            false,
            SettleReason::MaxAttemptsExceeded,
            &metrics,
            technique,
            self.scroll.max_attempts,
        )
    }

    /// Try each technique until the page moves or grows.
    async fn scroll_once(
        &self,
        page: &dyn RemotePage,
        before: &ScrollMetrics,
        target: f64,
        cancel: &CancellationToken,
    ) -> Result<(ScrollMetrics, Option<Technique>), PerceptionError> {
        let mut after = *before;
        for technique in Technique::ALL {
            match technique {
                Technique::Wheel => {
                    let x = f64::from(self.viewport.width) / 2.0;
                    let y = before.viewport_height / 2.0;
                    page.mouse_wheel(x, y, 0.0, target - before.scroll_top).await?;
                }
                _ => {
                    page.evaluate(SCROLL_SCRIPT, vec![json!(technique.as_str()), json!(target)])
                        .await?;
                }
            }
            pause(self.scroll.settle(), cancel).await?;

            after = read_metrics(page).await?;
            if after.moved_from(before) || after.grew_from(before) {
                trace!(technique = technique.as_str(), "Scroll technique took effect");
                return Ok((after, Some(technique)));
            }
        }
        Ok((after, None))
    }
}

#[cfg(test)]
#[path = "scroll_tests.rs"]
mod tests;
