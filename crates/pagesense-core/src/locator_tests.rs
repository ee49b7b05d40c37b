use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pagesense_protocols::BrowserError;
use tokio::time::Instant;

use super::*;
use crate::testing::{FakeBrowser, FakePage};

fn handle_for(browser: Arc<FakeBrowser>) -> Arc<ConnectionHandle> {
    Arc::new(ConnectionHandle::new(
        "http://browser:9222",
        "s1",
        browser,
        Arc::new(AtomicBool::new(true)),
        0,
    ))
}

fn locator() -> PageLocator {
    PageLocator::new(LocatorConfig::default(), ViewportConfig::default())
}

fn pages(focus: &[bool]) -> Vec<Arc<FakePage>> {
    focus
        .iter()
        .enumerate()
        .map(|(i, f)| Arc::new(FakePage::new(&format!("page-{}", i)).focused(*f)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_current_picks_first_focused_page() {
    let pages = pages(&[false, true, true]);
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages.clone()));

    let resolved = locator().current(&handle_for(browser)).await.unwrap();

    assert_eq!(resolved.index, 1);
    assert_eq!(resolved.total, 3);
    assert_eq!(resolved.page.id(), "page-1");
    assert_eq!(*pages[1].viewport.lock(), Some(Viewport::default()));
    assert!(pages[0].viewport.lock().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_current_defaults_to_first_page() {
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages(&[false, false])));

    let resolved = locator().current(&handle_for(browser)).await.unwrap();

    assert_eq!(resolved.index, 0);
    assert_eq!(resolved.page.id(), "page-0");
}

#[tokio::test(start_paused = true)]
async fn test_at_index() {
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages(&[true, false, false])));

    let resolved = locator().at_index(&handle_for(browser), 2).await.unwrap();

    assert_eq!(resolved.index, 2);
    assert_eq!(resolved.page.id(), "page-2");
}

#[tokio::test(start_paused = true)]
async fn test_at_index_out_of_bounds_is_not_retried() {
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages(&[false, false])));
    let start = Instant::now();

    let err = locator().at_index(&handle_for(browser), 2).await.unwrap_err();

    assert!(matches!(err, PerceptionError::IndexOutOfBounds { index: 2, total: 2 }));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_enumeration_error_is_retried() {
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages(&[false, true])));
    browser.pages_failures.store(1, Ordering::SeqCst);
    let start = Instant::now();

    let resolved = locator().current(&handle_for(browser)).await.unwrap();

    assert_eq!(resolved.index, 1);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_clamp_instead_of_failing() {
    let pages = pages(&[false, true]);
    for _ in 0..3 {
        pages[0].focus_errors.lock().push_back(BrowserError::Protocol {
            code: -32000,
            message: "Target closed".to_string(),
        });
    }
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages.clone()));
    let start = Instant::now();

    let resolved = locator().current(&handle_for(browser)).await.unwrap();

    assert_eq!(resolved.index, 0);
    assert_eq!(resolved.total, 2);
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_no_pages() {
    let browser = Arc::new(FakeBrowser::new(0));

    let err = locator().current(&handle_for(browser)).await.unwrap_err();

    assert!(matches!(err, PerceptionError::NoPage));
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_never_succeeds_surfaces_browser_error() {
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages(&[true])));
    browser.pages_failures.store(5, Ordering::SeqCst);

    let err = locator().current(&handle_for(browser)).await.unwrap_err();

    assert!(matches!(err, PerceptionError::Browser(_)));
}

#[tokio::test(start_paused = true)]
async fn test_located_page_follows_focus() {
    let pages = pages(&[true, false]);
    let browser = Arc::new(FakeBrowser::new(0).with_pages(pages.clone()));
    let source = locator().source(handle_for(browser), None);

    assert_eq!(source.resolve().await.unwrap().id(), "page-0");

    pages[0].focused.store(false, Ordering::SeqCst);
    pages[1].focused.store(true, Ordering::SeqCst);
    assert_eq!(source.resolve().await.unwrap().id(), "page-1");
}
