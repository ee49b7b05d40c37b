//! # pagesense protocols
//!
//! Interface definitions shared by every pagesense crate. Contains the
//! remote browser boundary (traits only, no implementations), the data
//! model produced by the perception engine, and the error taxonomy.
//!
//! ## Core Traits
//!
//! - [`RemoteBrowser`] - A live handle to a remote browser process
//! - [`RemotePage`] - A single page/tab inside that browser
//! - [`BrowserConnector`] - Opens new [`RemoteBrowser`] connections

pub mod browser;
pub mod error;
pub mod types;

pub use browser::{
    BrowserConnector, DisconnectCallback, ImageFormat, ListenerId, RemoteBrowser, RemotePage,
    ScreenshotOptions, Viewport,
};
pub use error::{BrowserError, PerceptionError};
pub use types::*;
