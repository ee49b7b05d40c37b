//! Endpoint resolution: pick the transport for a browser endpoint.

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::client::fetch_version;
use crate::error::CdpError;

/// Hosts a containerised browser reports in its own debugger URL.
const IN_CONTAINER_HOSTS: &[&str] = &["127.0.0.1", "localhost", "0.0.0.0"];

/// How to reach a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Connect straight to this WebSocket debugger URL.
    DirectWebSocket(String),
    /// Discover the debugger URL through this HTTP endpoint.
    Http(String),
}

/// Decides the transport for an endpoint.
///
/// Endpoints whose host matches the container pattern are resolved
/// out-of-band through `/json/version` and their debugger URL is rewritten to
/// the externally reachable host and port.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    container_pattern: Option<Regex>,
}

impl EndpointResolver {
    pub fn new(container_host_pattern: Option<&str>) -> Result<Self, CdpError> {
        let container_pattern = container_host_pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| CdpError::InvalidEndpoint(format!("container host pattern: {}", e)))?;
        Ok(Self { container_pattern })
    }

    /// Whether `host` identifies a browser container.
    pub fn is_container_host(&self, host: &str) -> bool {
        self.container_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(host))
    }

    pub async fn resolve(&self, endpoint: &str) -> Result<Transport, CdpError> {
        let endpoint = endpoint.trim_end_matches('/');
        let url = Url::parse(endpoint)?;

        if matches!(url.scheme(), "ws" | "wss") {
            return Ok(Transport::DirectWebSocket(endpoint.to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CdpError::InvalidEndpoint(format!("{}: missing host", endpoint)))?;

        if !self.is_container_host(host) {
            return Ok(Transport::Http(endpoint.to_string()));
        }

        let version = fetch_version(endpoint).await?;
        let ws_url = rewrite_debugger_url(&version.web_socket_debugger_url, &url)?;
        debug!(endpoint, ws_url = %ws_url, "Resolved container debugger URL");
        Ok(Transport::DirectWebSocket(ws_url))
    }
}

/// Replace an in-container host in `ws_url` with the host and port of
/// `external`. URLs that already name a routable host are kept.
pub(crate) fn rewrite_debugger_url(ws_url: &str, external: &Url) -> Result<String, CdpError> {
    let mut ws = Url::parse(ws_url)?;

    let in_container = ws
        .host_str()
        .is_some_and(|h| IN_CONTAINER_HOSTS.contains(&h));
    if !in_container {
        return Ok(ws.to_string());
    }

    if external.scheme() == "https" {
        ws.set_scheme("wss")
            .map_err(|_| CdpError::InvalidEndpoint(format!("{}: cannot set scheme", ws_url)))?;
    }
    ws.set_host(external.host_str())?;
    ws.set_port(external.port_or_known_default())
        .map_err(|_| CdpError::InvalidEndpoint(format!("{}: cannot set port", ws_url)))?;

    Ok(ws.to_string())
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
