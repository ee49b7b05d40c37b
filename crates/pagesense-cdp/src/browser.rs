//! `RemoteBrowser` / `RemotePage` over a CDP connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pagesense_protocols::{
    BrowserError, DisconnectCallback, ImageFormat, ListenerId, RemoteBrowser, RemotePage,
    ScreenshotOptions, Viewport,
};
use serde_json::Value;
use tracing::debug;

use crate::client::CdpClient;
use crate::protocol::ScreenshotClip;
use crate::session::PageSession;

/// A browser reached over CDP.
///
/// Page sessions are attached lazily and cached per target id so repeated
/// `pages()` calls hand out the same page objects.
pub struct CdpBrowser {
    client: CdpClient,
    sessions: tokio::sync::Mutex<HashMap<String, Arc<CdpPage>>>,
}

impl CdpBrowser {
    pub fn new(client: CdpClient) -> Self {
        Self {
            client,
            sessions: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &CdpClient {
        &self.client
    }
}

#[async_trait]
impl RemoteBrowser for CdpBrowser {
    async fn version(&self) -> Result<String, BrowserError> {
        Ok(self.client.version().await?)
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn RemotePage>>, BrowserError> {
        let targets = self.client.get_targets().await?;
        let mut sessions = self.sessions.lock().await;

        sessions.retain(|id, _| targets.iter().any(|t| &t.target_id == id));

        let mut pages: Vec<Arc<dyn RemotePage>> = Vec::new();
        for target in targets.iter().filter(|t| t.is_page()) {
            let page = match sessions.get(&target.target_id) {
                Some(page) => page.clone(),
                None => {
                    let session = self.client.attach_page(&target.target_id).await?;
                    debug!(target = %target.target_id, url = %target.url, "Attached page session");
                    let page = Arc::new(CdpPage::new(session));
                    sessions.insert(target.target_id.clone(), page.clone());
                    page
                }
            };
            pages.push(page);
        }

        Ok(pages)
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn on_disconnect(&self, callback: DisconnectCallback) -> ListenerId {
        self.client.on_disconnect(callback)
    }

    fn remove_disconnect_listener(&self, id: ListenerId) {
        self.client.remove_disconnect_listener(id);
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.sessions.lock().await.clear();
        Ok(self.client.close().await?)
    }
}

/// A page target reached through a flattened CDP session.
pub struct CdpPage {
    session: PageSession,
}

impl CdpPage {
    pub fn new(session: PageSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }
}

#[async_trait]
impl RemotePage for CdpPage {
    fn id(&self) -> &str {
        self.session.target_id()
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.session.get_url().await?)
    }

    async fn evaluate(&self, function: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        Ok(self.session.evaluate_function(function, &args).await?)
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError> {
        let (format, quality) = match options.format {
            ImageFormat::Png => ("png", None),
            ImageFormat::Jpeg => ("jpeg", options.quality),
        };
        let clip = options.clip.map(|b| ScreenshotClip {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
            scale: 1.0,
        });
        Ok(self
            .session
            .screenshot(format, quality, options.full_page, clip)
            .await?)
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), BrowserError> {
        Ok(self
            .session
            .set_viewport(viewport.width, viewport.height)
            .await?)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        Ok(self.session.mouse_move(x, y).await?)
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        Ok(self.session.click(x, y).await?)
    }

    async fn mouse_wheel(
        &self,
        x: f64,
        y: f64,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<(), BrowserError> {
        Ok(self.session.scroll(x, y, delta_x, delta_y).await?)
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        Ok(self.session.press_key(key).await?)
    }
}
