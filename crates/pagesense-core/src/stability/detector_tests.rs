use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use image::RgbaImage;
use pagesense_protocols::BrowserError;

use super::*;
use crate::stability::FixedPage;
use crate::testing::{FakePage, solid_frame};

const RED: [u8; 3] = [220, 30, 30];
const BLUE: [u8; 3] = [30, 30, 220];
const GREEN: [u8; 3] = [30, 200, 30];

fn detector() -> StabilityDetector {
    StabilityDetector::new(
        StabilityConfig::default(),
        ScrollConfig::default(),
        ViewportConfig::default(),
    )
}

fn frame(rgb: [u8; 3]) -> RgbaImage {
    solid_frame(64, 36, rgb)
}

/// Alternates red and blue on every capture.
fn flicker() -> impl Fn(Duration) -> RgbaImage + Send + Sync + 'static {
    let count = AtomicU32::new(0);
    move |_| {
        if count.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            frame(RED)
        } else {
            frame(BLUE)
        }
    }
}

fn context_destroyed() -> BrowserError {
    BrowserError::ContextDestroyed("Execution context was destroyed".to_string())
}

struct CountingSource {
    page: Arc<FakePage>,
    resolves: AtomicU32,
}

#[async_trait]
impl PageSource for CountingSource {
    async fn resolve(&self) -> Result<Arc<dyn RemotePage>, PerceptionError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }
}

#[test]
fn test_blank_urls() {
    assert!(is_blank_url("about:blank"));
    assert!(is_blank_url(""));
    assert!(is_blank_url("chrome://newtab/"));
    assert!(!is_blank_url("https://example.com/"));
}

#[tokio::test(start_paused = true)]
async fn test_static_page_settles_unchanged() {
    let page = Arc::new(FakePage::new("p"));

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.settled);
    assert_eq!(outcome.reason, SettleReason::Unchanged);
    assert_eq!(outcome.to_result().reason, "unchanged");
    assert_eq!(page.overlay_installs.load(Ordering::SeqCst), 1);
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_page_that_stops_changing_converges() {
    let count = AtomicU32::new(0);
    let page = Arc::new(FakePage::new("p").with_frames(move |elapsed| {
        let n = count.fetch_add(1, Ordering::SeqCst);
        if elapsed < Duration::from_millis(1200) {
            if n % 2 == 0 { frame(RED) } else { frame(BLUE) }
        } else {
            frame(GREEN)
        }
    }));
    *page.screenshot_delay.lock() = Some(Duration::from_millis(100));
    let start = Instant::now();

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.settled);
    assert_eq!(outcome.reason, SettleReason::Unchanged);
    assert!(start.elapsed() >= Duration::from_millis(1200));
    assert!(start.elapsed() < Duration::from_millis(10_000));
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flickering_page_does_not_settle() {
    let page = Arc::new(FakePage::new("p").with_frames(flicker()));

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.settled);
    // First and last frames are both blue.
    assert_eq!(outcome.reason, SettleReason::Unchanged);
    assert_eq!(outcome.sample_diff_percent, 100.0);
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_net_change_reported_when_not_settled() {
    let count = AtomicU32::new(0);
    let page = Arc::new(FakePage::new("p").with_frames(move |_| {
        let n = count.fetch_add(1, Ordering::SeqCst);
        match n {
            0 | 1 => frame(RED),
            n if n % 2 == 0 => frame(GREEN),
            _ => frame(BLUE),
        }
    }));

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.settled);
    assert_eq!(outcome.reason, SettleReason::Changed);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_race_after_restarts() {
    let page = Arc::new(FakePage::new("p"));
    for _ in 0..3 {
        page.screenshot_script.lock().push_back(Some(context_destroyed()));
    }

    let err = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PerceptionError::NavigationRace { attempts: 3 }));
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_navigation_mid_diff() {
    let page = Arc::new(FakePage::new("p"));
    {
        let mut script = page.screenshot_script.lock();
        script.push_back(None);
        script.push_back(None);
        script.push_back(Some(context_destroyed()));
    }

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.settled);
    assert_eq!(page.overlay_installs.load(Ordering::SeqCst), 2);
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_fail_without_restart() {
    let page = Arc::new(FakePage::new("p"));
    page.screenshot_script.lock().push_back(Some(BrowserError::Closed));

    let err = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PerceptionError::Browser(BrowserError::Closed)));
    assert_eq!(page.overlay_installs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_removes_overlays() {
    let page = Arc::new(FakePage::new("p").with_frames(flicker()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let err = detector()
        .wait_until_stable(&FixedPage(page.clone()), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PerceptionError::Cancelled));
    assert_eq!(page.overlay_installs.load(Ordering::SeqCst), 1);
    assert_eq!(page.active_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_timeout_degrades_to_blank_frame() {
    let page = Arc::new(FakePage::new("p"));
    *page.screenshot_delay.lock() = Some(Duration::from_secs(5));
    let start = Instant::now();

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    // Blank frames compare equal, so the page counts as settled.
    assert!(outcome.settled);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_blank_url_wait_is_bounded() {
    let page = Arc::new(FakePage::new("p").with_url("about:blank"));
    let start = Instant::now();

    let outcome = detector()
        .wait_until_stable(&FixedPage(page.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.settled);
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_white_baseline_is_retaken_on_fresh_page() {
    let count = AtomicU32::new(0);
    let page = Arc::new(FakePage::new("p").with_frames(move |_| {
        if count.fetch_add(1, Ordering::SeqCst) < 3 {
            frame([255, 255, 255])
        } else {
            frame(RED)
        }
    }));
    let source = CountingSource {
        page: page.clone(),
        resolves: AtomicU32::new(0),
    };

    let outcome = detector()
        .wait_until_stable(&source, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.settled);
    assert_eq!(source.resolves.load(Ordering::SeqCst), 4);
}
