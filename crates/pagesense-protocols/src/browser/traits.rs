//! Remote browser and page traits.
//!
//! The perception engine never talks to a browser directly; it consumes
//! these capabilities. `pagesense-cdp` provides the DevTools Protocol
//! implementation, tests provide scripted fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::options::{ScreenshotOptions, Viewport};
use crate::error::BrowserError;

/// Identifier returned when registering a disconnect listener.
pub type ListenerId = u64;

/// Callback fired once when the browser connection drops.
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// A single page (tab) of a remote browser.
#[async_trait]
pub trait RemotePage: Send + Sync {
    /// Stable identifier of the page target.
    fn id(&self) -> &str;

    /// Current document URL.
    async fn url(&self) -> Result<String, BrowserError>;

    /// Evaluate a JavaScript function expression in page context.
    ///
    /// `function` is the source of a function expression; it is invoked with
    /// `args` and its (awaited) return value is returned as JSON.
    async fn evaluate(&self, function: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

    /// Capture a screenshot and return the encoded image bytes.
    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError>;

    /// Resize the page viewport.
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError>;

    /// Move the mouse pointer.
    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), BrowserError>;

    /// Left click at a point.
    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), BrowserError>;

    /// Dispatch a wheel event at a point.
    async fn mouse_wheel(&self, x: f64, y: f64, delta_x: f64, delta_y: f64)
        -> Result<(), BrowserError>;

    /// Press and release a key.
    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;
}

/// A live connection to a remote browser process.
#[async_trait]
pub trait RemoteBrowser: Send + Sync {
    /// Browser product/version string. Cheap; used as a liveness probe.
    async fn version(&self) -> Result<String, BrowserError>;

    /// All open pages, in target order.
    async fn pages(&self) -> Result<Vec<Arc<dyn RemotePage>>, BrowserError>;

    /// Whether the underlying transport is still open.
    fn is_connected(&self) -> bool;

    /// Register a callback fired when the connection drops.
    fn on_disconnect(&self, callback: DisconnectCallback) -> ListenerId;

    /// Remove a previously registered disconnect callback.
    fn remove_disconnect_listener(&self, id: ListenerId);

    /// Close the connection.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Opens new browser connections for the connection pool.
#[async_trait]
pub trait BrowserConnector: Send + Sync {
    /// Connect to the browser behind `endpoint` on behalf of `session_id`.
    async fn connect(
        &self,
        endpoint: &str,
        session_id: &str,
    ) -> Result<Arc<dyn RemoteBrowser>, BrowserError>;
}
