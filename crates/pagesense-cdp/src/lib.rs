//! Chrome DevTools Protocol (CDP) implementation of the pagesense browser
//! boundary.
//!
//! Connects to Chrome/Chromium via WebSocket and speaks the CDP JSON-RPC
//! protocol. [`CdpBrowser`] and [`CdpPage`] implement the
//! [`RemoteBrowser`](pagesense_protocols::RemoteBrowser) and
//! [`RemotePage`](pagesense_protocols::RemotePage) traits, and
//! [`CdpConnector`] plugs into the connection pool.
//!
//! ## Usage
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --remote-debugging-port=9222
//!    ```
//!
//! 2. Connect:
//!    ```rust,ignore
//!    let connector = CdpConnector::new(None)?;
//!    let browser = connector.connect("http://localhost:9222", "session-1").await?;
//!    let pages = browser.pages().await?;
//!    ```

mod browser;
mod client;
mod connector;
mod error;
mod protocol;
mod resolver;
mod session;

pub use browser::{CdpBrowser, CdpPage};
pub use client::CdpClient;
pub use connector::CdpConnector;
pub use error::CdpError;
pub use protocol::*;
pub use resolver::{EndpointResolver, Transport};
pub use session::PageSession;
