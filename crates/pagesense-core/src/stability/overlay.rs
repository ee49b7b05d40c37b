//! Opaque overlays over carousels, videos, large images and background
//! images, so their motion does not register as page change.

use std::sync::Arc;

use pagesense_config::StabilityConfig;
use pagesense_protocols::{BrowserError, RemotePage};
use serde_json::json;
use tracing::debug;

pub(crate) const INSTALL_OVERLAYS_SCRIPT: &str = include_str!("install_overlays.js");

pub(crate) const REMOVE_OVERLAYS_SCRIPT: &str = r#"() => {
  const overlays = document.querySelectorAll('[data-pagesense-overlay]');
  overlays.forEach((el) => el.remove());
  return overlays.length;
}"#;

/// Installed overlays on one page.
///
/// Call [`remove`](Self::remove) on every exit path. Dropping the guard
/// without it (a cancelled future, a panic) schedules removal on the
/// runtime instead.
pub(crate) struct OverlayGuard {
    page: Option<Arc<dyn RemotePage>>,
}

impl OverlayGuard {
    pub(crate) async fn install(
        page: Arc<dyn RemotePage>,
        config: &StabilityConfig,
    ) -> Result<Self, BrowserError> {
        let args = vec![
            json!(config.banned_classes),
            json!(config.min_overlay_image_width),
        ];
        match page.evaluate(INSTALL_OVERLAYS_SCRIPT, args).await {
            Ok(count) => {
                debug!(page = page.id(), overlays = %count, "Installed noise overlays");
                Ok(Self { page: Some(page) })
            }
            Err(e) => {
                // Some overlays may already be in place.
                remove_overlays(page.as_ref()).await;
                Err(e)
            }
        }
    }

    pub(crate) async fn remove(mut self) {
        if let Some(page) = self.page.take() {
            remove_overlays(page.as_ref()).await;
        }
    }
}

impl Drop for OverlayGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                remove_overlays(page.as_ref()).await;
            });
        }
    }
}

async fn remove_overlays(page: &dyn RemotePage) {
    match page.evaluate(REMOVE_OVERLAYS_SCRIPT, Vec::new()).await {
        Ok(count) => debug!(page = page.id(), overlays = %count, "Removed noise overlays"),
        Err(e) => debug!(page = page.id(), "Overlay removal failed: {}", e),
    }
}
