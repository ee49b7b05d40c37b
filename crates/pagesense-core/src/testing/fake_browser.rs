use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pagesense_protocols::{
    BrowserConnector, BrowserError, DisconnectCallback, ListenerId, RemoteBrowser, RemotePage,
    ScreenshotOptions, Viewport,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::dom::SNAPSHOT_SCRIPT;
use crate::locator::FOCUS_SCRIPT;
use crate::stability::overlay::{INSTALL_OVERLAYS_SCRIPT, REMOVE_OVERLAYS_SCRIPT};
use crate::stability::scroll::{SCROLL_METRICS_SCRIPT, SCROLL_SCRIPT};

/// A frame filled with one color.
pub(crate) fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

type FrameFn = Box<dyn Fn(Duration) -> RgbaImage + Send + Sync>;

/// Scroll model of a fake page.
#[derive(Debug, Clone)]
pub(crate) struct FakeScroll {
    pub top: f64,
    pub height: f64,
    pub viewport: f64,
    /// Techniques that move the page: `scrollTo`, `documentElement`, `body`, `wheel`.
    pub honored: Vec<&'static str>,
    /// Height appended every time the bottom is reached.
    pub growth_at_bottom: f64,
}

impl Default for FakeScroll {
    fn default() -> Self {
        Self {
            top: 0.0,
            height: 3000.0,
            viewport: 720.0,
            honored: vec!["scrollTo", "documentElement", "body", "wheel"],
            growth_at_bottom: 0.0,
        }
    }
}

impl FakeScroll {
    fn move_to(&mut self, target: f64) {
        let max = (self.height - self.viewport).max(0.0);
        self.top = target.clamp(0.0, max);
        if self.top >= max - 1.0 {
            self.height += self.growth_at_bottom;
        }
    }
}

/// Scripted page.
pub(crate) struct FakePage {
    id: String,
    created: Instant,
    pub url: Mutex<String>,
    pub focused: AtomicBool,
    pub viewport: Mutex<Option<Viewport>>,
    pub snapshot: Mutex<Option<Value>>,
    frames: Mutex<FrameFn>,
    pub screenshot_delay: Mutex<Option<Duration>>,
    pub screenshots: AtomicU32,
    pub overlay_installs: AtomicU32,
    pub overlay_removals: AtomicU32,
    pub scroll: Mutex<FakeScroll>,
    /// Outcomes of the next screenshot calls, in order: `Some` fails the
    /// call, `None` lets it through.
    pub screenshot_script: Mutex<VecDeque<Option<BrowserError>>>,
    /// Errors returned by the next focus checks, in order.
    pub focus_errors: Mutex<VecDeque<BrowserError>>,
    pub fail_viewport: AtomicBool,
}

impl FakePage {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created: Instant::now(),
            url: Mutex::new(format!("https://example.com/{}", id)),
            focused: AtomicBool::new(false),
            viewport: Mutex::new(None),
            snapshot: Mutex::new(None),
            frames: Mutex::new(Box::new(|_| solid_frame(64, 36, [200, 120, 40]))),
            screenshot_delay: Mutex::new(None),
            screenshots: AtomicU32::new(0),
            overlay_installs: AtomicU32::new(0),
            overlay_removals: AtomicU32::new(0),
            scroll: Mutex::new(FakeScroll::default()),
            screenshot_script: Mutex::new(VecDeque::new()),
            focus_errors: Mutex::new(VecDeque::new()),
            fail_viewport: AtomicBool::new(false),
        }
    }

    pub fn focused(self, focused: bool) -> Self {
        self.focused.store(focused, Ordering::SeqCst);
        self
    }

    /// Frames as a function of time since the page was created.
    pub fn with_frames(self, frames: impl Fn(Duration) -> RgbaImage + Send + Sync + 'static) -> Self {
        *self.frames.lock() = Box::new(frames);
        self
    }

    pub fn with_snapshot(self, snapshot: &crate::dom::DomSnapshot) -> Self {
        *self.snapshot.lock() = serde_json::to_value(snapshot).ok();
        self
    }

    pub fn with_scroll(self, scroll: FakeScroll) -> Self {
        *self.scroll.lock() = scroll;
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        *self.url.lock() = url.to_string();
        self
    }

    pub fn active_overlays(&self) -> i64 {
        i64::from(self.overlay_installs.load(Ordering::SeqCst))
            - i64::from(self.overlay_removals.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl RemotePage for FakePage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.url.lock().clone())
    }

    async fn evaluate(&self, function: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        if function == FOCUS_SCRIPT {
            if let Some(err) = self.focus_errors.lock().pop_front() {
                return Err(err);
            }
            return Ok(json!(self.focused.load(Ordering::SeqCst)));
        }
        if function == INSTALL_OVERLAYS_SCRIPT {
            self.overlay_installs.fetch_add(1, Ordering::SeqCst);
            return Ok(json!(3));
        }
        if function == REMOVE_OVERLAYS_SCRIPT {
            self.overlay_removals.fetch_add(1, Ordering::SeqCst);
            return Ok(json!(3));
        }
        if function == SCROLL_METRICS_SCRIPT {
            let scroll = self.scroll.lock();
            return Ok(json!({
                "scrollTop": scroll.top,
                "scrollHeight": scroll.height,
                "viewportHeight": scroll.viewport,
            }));
        }
        if function == SCROLL_SCRIPT {
            let technique = args.first().and_then(|v| v.as_str()).unwrap_or_default();
            let target = args.get(1).and_then(|v| v.as_f64()).unwrap_or_default();
            let mut scroll = self.scroll.lock();
            if scroll.honored.contains(&technique) {
                scroll.move_to(target);
            }
            return Ok(Value::Null);
        }
        if function == SNAPSHOT_SCRIPT {
            return self
                .snapshot
                .lock()
                .clone()
                .ok_or_else(|| BrowserError::JavaScript("no snapshot scripted".to_string()));
        }
        Err(BrowserError::JavaScript("unexpected script".to_string()))
    }

    async fn screenshot(&self, _options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        if let Some(Some(err)) = self.screenshot_script.lock().pop_front() {
            return Err(err);
        }
        let delay = *self.screenshot_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let frame = (*self.frames.lock())(self.created.elapsed());
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(frame)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .map_err(|e| BrowserError::InvalidResponse(e.to_string()))?;
        Ok(bytes.into_inner())
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError> {
        if self.fail_viewport.load(Ordering::SeqCst) {
            return Err(BrowserError::Protocol {
                code: -32000,
                message: "Target closed".to_string(),
            });
        }
        *self.viewport.lock() = Some(viewport);
        Ok(())
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn mouse_click(&self, _x: f64, _y: f64) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn mouse_wheel(&self, _x: f64, _y: f64, _dx: f64, dy: f64) -> Result<(), BrowserError> {
        let mut scroll = self.scroll.lock();
        if scroll.honored.contains(&"wheel") {
            let target = scroll.top + dy;
            scroll.move_to(target);
        }
        Ok(())
    }

    async fn press_key(&self, _key: &str) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Scripted browser.
pub(crate) struct FakeBrowser {
    pub serial: usize,
    pub pages: Mutex<Vec<Arc<FakePage>>>,
    connected: AtomicBool,
    pub probe_fails: AtomicBool,
    /// `pages()` calls that fail before the list is returned.
    pub pages_failures: AtomicU32,
    listeners: Mutex<HashMap<ListenerId, DisconnectCallback>>,
    next_listener: AtomicU64,
    pub closed: AtomicBool,
}

impl FakeBrowser {
    pub fn new(serial: usize) -> Self {
        Self {
            serial,
            pages: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            probe_fails: AtomicBool::new(false),
            pages_failures: AtomicU32::new(0),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_pages(self, pages: Vec<Arc<FakePage>>) -> Self {
        *self.pages.lock() = pages;
        self
    }

    /// Simulate the transport dropping.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let listeners: Vec<DisconnectCallback> =
            self.listeners.lock().drain().map(|(_, cb)| cb).collect();
        for callback in listeners {
            callback();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[async_trait]
impl RemoteBrowser for FakeBrowser {
    async fn version(&self) -> Result<String, BrowserError> {
        if self.probe_fails.load(Ordering::SeqCst) || !self.connected.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        Ok(format!("FakeChrome/{}", self.serial))
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn RemotePage>>, BrowserError> {
        let remaining = self.pages_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.pages_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BrowserError::Protocol {
                code: -32000,
                message: "No target with given id found".to_string(),
            });
        }
        Ok(self
            .pages
            .lock()
            .iter()
            .map(|p| p.clone() as Arc<dyn RemotePage>)
            .collect())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn on_disconnect(&self, callback: DisconnectCallback) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, callback);
        id
    }

    fn remove_disconnect_listener(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out fresh fake browsers.
#[derive(Default)]
pub(crate) struct FakeConnector {
    pub created: Mutex<Vec<Arc<FakeBrowser>>>,
    pub calls: AtomicUsize,
    /// Connect calls that fail before one succeeds.
    pub failures: AtomicU32,
    /// Never answer; exercises the connect timeout.
    pub hang: AtomicBool,
}

impl FakeConnector {
    pub fn browser(&self, i: usize) -> Arc<FakeBrowser> {
        self.created.lock()[i].clone()
    }
}

#[async_trait]
impl BrowserConnector for FakeConnector {
    async fn connect(
        &self,
        _endpoint: &str,
        _session_id: &str,
    ) -> Result<Arc<dyn RemoteBrowser>, BrowserError> {
        let serial = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failures = self.failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.failures.store(failures - 1, Ordering::SeqCst);
            return Err(BrowserError::ConnectionFailed("connection refused".to_string()));
        }
        let browser = Arc::new(
            FakeBrowser::new(serial).with_pages(vec![Arc::new(FakePage::new("page-0"))]),
        );
        self.created.lock().push(browser.clone());
        Ok(browser)
    }
}
