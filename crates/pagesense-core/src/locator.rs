//! Page locator: resolves the focused page, or the page at an index.
//!
//! Tabs open and close underneath us, so every resolution is retried as a
//! whole. Once the budget runs out the last enumeration is used with the
//! index clamped into bounds; only an empty browser is an error.

use std::sync::Arc;

use async_trait::async_trait;
use pagesense_config::{LocatorConfig, ViewportConfig};
use pagesense_protocols::{PerceptionError, RemotePage, Viewport};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::pool::ConnectionHandle;
use crate::stability::PageSource;

/// Reports whether the page's document has focus.
pub(crate) const FOCUS_SCRIPT: &str = "() => document.hasFocus()";

/// A resolved page with its position among all open pages.
#[derive(Clone)]
pub struct ResolvedPage {
    pub page: Arc<dyn RemotePage>,
    pub index: usize,
    pub total: usize,
}

impl std::fmt::Debug for ResolvedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPage")
            .field("page", &self.page.id())
            .field("index", &self.index)
            .field("total", &self.total)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Focused,
    Index(usize),
}

/// Resolves pages of a pooled browser.
#[derive(Debug, Clone)]
pub struct PageLocator {
    config: LocatorConfig,
    viewport: Viewport,
}

impl PageLocator {
    pub fn new(config: LocatorConfig, viewport: ViewportConfig) -> Self {
        Self {
            config,
            viewport: Viewport {
                width: viewport.width,
                height: viewport.height,
            },
        }
    }

    /// The first page whose document has focus, else page 0.
    pub async fn current(&self, handle: &ConnectionHandle) -> Result<ResolvedPage, PerceptionError> {
        self.resolve(handle, Target::Focused).await
    }

    /// The page at `index`.
    pub async fn at_index(
        &self,
        handle: &ConnectionHandle,
        index: usize,
    ) -> Result<ResolvedPage, PerceptionError> {
        self.resolve(handle, Target::Index(index)).await
    }

    /// A [`PageSource`] that re-resolves through this locator on demand.
    pub fn source(&self, handle: Arc<ConnectionHandle>, index: Option<usize>) -> LocatedPage {
        LocatedPage {
            locator: self.clone(),
            handle,
            index,
        }
    }

    async fn resolve(
        &self,
        handle: &ConnectionHandle,
        target: Target,
    ) -> Result<ResolvedPage, PerceptionError> {
        let attempts = self.config.attempts.max(1);
        let mut last_pages: Option<Vec<Arc<dyn RemotePage>>> = None;
        let mut last_error: Option<PerceptionError> = None;

        for attempt in 1..=attempts {
            match handle.browser().pages().await {
                Ok(pages) => {
                    last_pages = Some(pages.clone());
                    match self.pick(pages, target).await {
                        Ok(resolved) => return Ok(resolved),
                        Err(e) if e.is_caller_error() && !matches!(e, PerceptionError::NoPage) => {
                            return Err(e);
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                Err(e) => last_error = Some(e.into()),
            }

            if let Some(ref e) = last_error {
                warn!(attempt, attempts, "Page resolution failed: {}", e);
            }
            if attempt < attempts {
                sleep(self.config.retry_delay()).await;
            }
        }

        match last_pages {
            Some(pages) if !pages.is_empty() => {
                let wanted = match target {
                    Target::Focused => 0,
                    Target::Index(i) => i,
                };
                let index = wanted.min(pages.len() - 1);
                debug!(index, total = pages.len(), "Falling back to clamped page index");
                let total = pages.len();
                let page = pages[index].clone();
                if let Err(e) = page.set_viewport(self.viewport).await {
                    debug!("Viewport not applied: {}", e);
                }
                Ok(ResolvedPage { page, index, total })
            }
            Some(_) => Err(PerceptionError::NoPage),
            None => Err(last_error.unwrap_or(PerceptionError::NoPage)),
        }
    }

    async fn pick(
        &self,
        pages: Vec<Arc<dyn RemotePage>>,
        target: Target,
    ) -> Result<ResolvedPage, PerceptionError> {
        let total = pages.len();
        if total == 0 {
            return Err(PerceptionError::NoPage);
        }

        let index = match target {
            Target::Index(i) if i >= total => {
                return Err(PerceptionError::IndexOutOfBounds { index: i, total });
            }
            Target::Index(i) => i,
            Target::Focused => {
                let mut focused = None;
                for (i, page) in pages.iter().enumerate() {
                    let has_focus = page.evaluate(FOCUS_SCRIPT, Vec::new()).await?;
                    if has_focus.as_bool().unwrap_or(false) {
                        focused = Some(i);
                        break;
                    }
                }
                focused.unwrap_or(0)
            }
        };

        let page = pages[index].clone();
        page.set_viewport(self.viewport).await?;
        debug!(page = page.id(), index, total, "Resolved page");
        Ok(ResolvedPage { page, index, total })
    }
}

/// A page re-resolved through the locator on every request, so detectors
/// follow the tab across navigations.
#[derive(Debug, Clone)]
pub struct LocatedPage {
    locator: PageLocator,
    handle: Arc<ConnectionHandle>,
    index: Option<usize>,
}

#[async_trait]
impl PageSource for LocatedPage {
    async fn resolve(&self) -> Result<Arc<dyn RemotePage>, PerceptionError> {
        let resolved = match self.index {
            Some(i) => self.locator.at_index(&self.handle, i).await?,
            None => self.locator.current(&self.handle).await?,
        };
        Ok(resolved.page)
    }
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
