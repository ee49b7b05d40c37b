//! Remote browser boundary.

mod options;
mod traits;

pub use options::{ImageFormat, ScreenshotOptions, Viewport};
pub use traits::{BrowserConnector, DisconnectCallback, ListenerId, RemoteBrowser, RemotePage};
