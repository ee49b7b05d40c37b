//! Connection factory used by the pool.

use std::sync::Arc;

use async_trait::async_trait;
use pagesense_protocols::{BrowserConnector, BrowserError, RemoteBrowser};
use tracing::{debug, info};

use crate::browser::CdpBrowser;
use crate::client::CdpClient;
use crate::error::CdpError;
use crate::resolver::{EndpointResolver, Transport};

/// Opens CDP connections, choosing the transport per endpoint.
pub struct CdpConnector {
    resolver: EndpointResolver,
}

impl CdpConnector {
    /// Create a connector. Hosts matching `container_host_pattern` are
    /// reached through their WebSocket debugger URL directly.
    pub fn new(container_host_pattern: Option<&str>) -> Result<Self, CdpError> {
        Ok(Self {
            resolver: EndpointResolver::new(container_host_pattern)?,
        })
    }

    pub fn with_resolver(resolver: EndpointResolver) -> Self {
        Self { resolver }
    }

    async fn open(&self, endpoint: &str) -> Result<CdpClient, CdpError> {
        match self.resolver.resolve(endpoint).await? {
            Transport::DirectWebSocket(ws_url) => {
                debug!(endpoint, ws_url = %ws_url, "Connecting over direct WebSocket");
                CdpClient::connect_ws(&ws_url).await
            }
            Transport::Http(http) => {
                debug!(endpoint, "Connecting over HTTP discovery");
                CdpClient::connect(&http).await
            }
        }
    }
}

#[async_trait]
impl BrowserConnector for CdpConnector {
    async fn connect(
        &self,
        endpoint: &str,
        session_id: &str,
    ) -> Result<Arc<dyn RemoteBrowser>, BrowserError> {
        let client = self.open(endpoint).await?;
        info!(endpoint, session = session_id, "Browser connected");
        Ok(Arc::new(CdpBrowser::new(client)))
    }
}
