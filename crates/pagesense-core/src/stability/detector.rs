//! Visual stability state machine.
//!
//! `Init -> WaitNotBlank -> Baseline -> DiffLoop -> Settled`, with
//! `FlakyRetry -> Init` when the page navigates mid-measurement and
//! `Failed` once a budget runs out. Overlays installed during `Baseline`
//! are removed before any terminal state returns.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use pagesense_config::{Config, ScrollConfig, StabilityConfig, ViewportConfig};
use pagesense_protocols::{
    PerceptionError, RemotePage, SettleReason, StabilityOutcome, Viewport,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::capture::FrameCapture;
use super::diff::{mismatch_percent, white_ratio};
use super::overlay::OverlayGuard;
use super::{PageSource, pause};

/// URLs of pages that have not started loading yet.
const BLANK_URLS: &[&str] = &[
    "",
    "about:blank",
    "about:newtab",
    "chrome://newtab/",
    "chrome://new-tab-page/",
];

fn is_blank_url(url: &str) -> bool {
    BLANK_URLS.contains(&url.trim())
}

fn is_navigation_race(err: &PerceptionError) -> bool {
    matches!(err, PerceptionError::Browser(e) if e.is_context_destroyed())
}

/// Waits for pages to stop changing.
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    pub(super) config: StabilityConfig,
    pub(super) scroll: ScrollConfig,
    pub(super) viewport: Viewport,
}

enum State {
    Init,
    WaitNotBlank,
    Baseline,
    DiffLoop,
    /// Terminal. Carries the outcome whether or not the page settled.
    Settled(StabilityOutcome),
    FlakyRetry(PerceptionError),
    Failed(PerceptionError),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Init => "init",
            State::WaitNotBlank => "wait_not_blank",
            State::Baseline => "baseline",
            State::DiffLoop => "diff_loop",
            State::Settled(_) => "settled",
            State::FlakyRetry(_) => "flaky_retry",
            State::Failed(_) => "failed",
        }
    }

    fn from_step(result: Result<State, PerceptionError>) -> State {
        match result {
            Ok(next) => next,
            Err(e) if is_navigation_race(&e) => State::FlakyRetry(e),
            Err(e) => State::Failed(e),
        }
    }
}

/// Mutable context of one detector run.
struct Run<'a> {
    config: &'a StabilityConfig,
    source: &'a dyn PageSource,
    cancel: &'a CancellationToken,
    capture: FrameCapture<'a>,
    restarts: u32,
    page: Option<Arc<dyn RemotePage>>,
    overlays: Option<OverlayGuard>,
    baseline: Option<RgbaImage>,
}

impl StabilityDetector {
    pub fn new(config: StabilityConfig, scroll: ScrollConfig, viewport: ViewportConfig) -> Self {
        Self {
            config,
            scroll,
            viewport: Viewport {
                width: viewport.width,
                height: viewport.height,
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.stability.clone(), config.scroll.clone(), config.viewport)
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Block until the page stops changing visually, or a budget runs out.
    ///
    /// Returns `settled = true` with reason `unchanged` on success. When the
    /// page keeps changing, the first frame is compared with the last one
    /// and the outcome reports `changed` or `unchanged` with
    /// `settled = false`. Fails with `NavigationRace` when the page keeps
    /// navigating away, and with `Cancelled` when `cancel` fires.
    pub async fn wait_until_stable(
        &self,
        source: &dyn PageSource,
        cancel: &CancellationToken,
    ) -> Result<StabilityOutcome, PerceptionError> {
        let mut run = Run {
            config: &self.config,
            source,
            cancel,
            capture: FrameCapture::new(&self.config, self.viewport),
            restarts: 0,
            page: None,
            overlays: None,
            baseline: None,
        };

        let mut state = State::Init;
        loop {
            if cancel.is_cancelled() && !matches!(state, State::Settled(_) | State::Failed(_)) {
                state = State::Failed(PerceptionError::Cancelled);
            }
            trace!(state = state.name(), restarts = run.restarts, "Stability transition");

            state = match state {
                State::Init => State::from_step(run.init().await),
                State::WaitNotBlank => State::from_step(run.wait_not_blank().await),
                State::Baseline => State::from_step(run.baseline().await),
                State::DiffLoop => State::from_step(run.diff_loop().await),
                State::FlakyRetry(err) => {
                    run.cleanup().await;
                    if run.restarts >= self.config.flaky_retries {
                        State::Failed(PerceptionError::NavigationRace {
                            attempts: run.restarts + 1,
                        })
                    } else {
                        run.restarts += 1;
                        warn!(
                            restart = run.restarts,
                            "Page navigated during stability check ({}), restarting", err
                        );
                        State::Init
                    }
                }
                State::Settled(outcome) => {
                    run.cleanup().await;
                    return Ok(outcome);
                }
                State::Failed(err) => {
                    run.cleanup().await;
                    debug!("Stability check failed: {}", err);
                    return Err(err);
                }
            };
        }
    }
}

impl Run<'_> {
    /// Blur factor widening capture timeouts after each restart.
    fn factor(&self) -> u32 {
        self.restarts + 1
    }

    fn page(&self) -> Result<Arc<dyn RemotePage>, PerceptionError> {
        self.page.clone().ok_or(PerceptionError::NoPage)
    }

    async fn init(&mut self) -> Result<State, PerceptionError> {
        self.baseline = None;
        self.page = Some(self.source.resolve().await?);
        Ok(State::WaitNotBlank)
    }

    async fn wait_not_blank(&mut self) -> Result<State, PerceptionError> {
        let page = self.page()?;
        let deadline = Instant::now() + self.config.blank_page_timeout();

        loop {
            let url = page.url().await?;
            if !is_blank_url(&url) {
                break;
            }
            if Instant::now() >= deadline {
                debug!(page = page.id(), "Page still blank, proceeding");
                break;
            }
            pause(self.config.pull_duration(), self.cancel).await?;
        }
        Ok(State::Baseline)
    }

    async fn baseline(&mut self) -> Result<State, PerceptionError> {
        let factor = self.factor();
        let mut page = self.page()?;

        for retake in 0..=self.config.white_retries {
            let frame = self.capture.capture(page.as_ref(), factor).await?;
            let ratio = white_ratio(&frame);
            if ratio <= self.config.white_pixel_ratio {
                break;
            }
            if retake == self.config.white_retries {
                debug!(ratio, "Baseline still blank after {} retakes", retake);
                break;
            }
            trace!(ratio, retake, "Baseline mostly white, retaking");
            pause(self.config.pull_duration(), self.cancel).await?;
            page = self.source.resolve().await?;
            self.page = Some(page.clone());
        }

        self.overlays = Some(OverlayGuard::install(page.clone(), self.config).await?);
        self.baseline = Some(self.capture.capture(page.as_ref(), factor).await?);
        Ok(State::DiffLoop)
    }

    async fn diff_loop(&mut self) -> Result<State, PerceptionError> {
        let page = self.page()?;
        let factor = self.factor();
        let pull = self.config.pull_duration();
        let threshold = self.config.pixel_threshold;
        let change = self.config.change_threshold_percent;
        let baseline = self
            .baseline
            .clone()
            .ok_or_else(|| PerceptionError::InvalidInput("missing baseline frame".to_string()))?;

        let mut budget = Duration::from_millis(self.config.timeout_ms);
        let mut still_changing = 0;
        let mut last_diff = 0.0;
        let mut last_frame;

        loop {
            let mut previous = self.capture.capture(page.as_ref(), factor).await?;
            let mut stable = 0;
            let mut exhausted = false;

            for comparison in 1..=self.config.max_comparisons {
                pause(pull, self.cancel).await?;
                budget = budget.saturating_sub(pull);

                let current = self.capture.capture(page.as_ref(), factor).await?;
                last_diff = mismatch_percent(&previous, &current, threshold);
                trace!(comparison, diff = last_diff, stable, "Compared frames");

                if last_diff < change {
                    stable += 1;
                    if stable >= self.config.stable_samples {
                        debug!(
                            page = page.id(),
                            attempt = still_changing + 1,
                            diff = last_diff,
                            "Page settled"
                        );
                        return Ok(State::Settled(StabilityOutcome::new(
                            true,
                            SettleReason::Unchanged,
                            last_diff,
                        )));
                    }
                } else {
                    stable = 0;
                }
                previous = current;

                if budget.is_zero() {
                    exhausted = true;
                    break;
                }
            }

            last_frame = previous;
            if exhausted {
                debug!("Stability budget exhausted");
                break;
            }
            still_changing += 1;
            debug!(still_changing, max = self.config.max_attempts, "Page still changing");
            if still_changing >= self.config.max_attempts {
                break;
            }
        }

        let net = mismatch_percent(&baseline, &last_frame, threshold);
        let reason = if net > change {
            SettleReason::Changed
        } else {
            SettleReason::Unchanged
        };
        info!(page = page.id(), net_diff = net, reason = %reason, "Page did not settle");
        Ok(State::Settled(StabilityOutcome::new(false, reason, last_diff)))
    }

    async fn cleanup(&mut self) {
        if let Some(overlays) = self.overlays.take() {
            overlays.remove().await;
        }
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
