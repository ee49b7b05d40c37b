//! Visual stability: decides when a page has stopped changing by diffing
//! successive screenshots, and settles scrolls by watching scroll metrics.

mod capture;
mod detector;
mod diff;
pub(crate) mod overlay;
pub(crate) mod scroll;

pub use detector::StabilityDetector;
pub use scroll::ScrollDirection;

use std::sync::Arc;

use async_trait::async_trait;
use pagesense_protocols::{PerceptionError, RemotePage};
use tokio_util::sync::CancellationToken;

/// Supplies the page to measure. Called again whenever the detector needs
/// a fresh handle, e.g. after the page navigated.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn resolve(&self) -> Result<Arc<dyn RemotePage>, PerceptionError>;
}

/// Always the same page.
#[derive(Clone)]
pub struct FixedPage(pub Arc<dyn RemotePage>);

#[async_trait]
impl PageSource for FixedPage {
    async fn resolve(&self) -> Result<Arc<dyn RemotePage>, PerceptionError> {
        Ok(self.0.clone())
    }
}

/// Sleep unless cancelled first.
pub(crate) async fn pause(
    duration: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<(), PerceptionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(PerceptionError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
