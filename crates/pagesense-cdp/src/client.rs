//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use pagesense_protocols::{DisconnectCallback, ListenerId};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::CdpError;
use crate::protocol::{BrowserVersion, CdpMessage, CdpRequest, TargetInfo};
use crate::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Per-request timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending request waiting for response.
struct PendingRequest {
    tx: oneshot::Sender<Result<Value, CdpError>>,
}

/// Connection state shared by the client and every page session.
pub(crate) struct Channel {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    connected: AtomicBool,
    listeners: Mutex<HashMap<ListenerId, DisconnectCallback>>,
    next_listener: AtomicU64,
}

impl Channel {
    /// Send a CDP command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        if !self.is_connected() {
            return Err(CdpError::SessionClosed);
        }

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Flip to disconnected and fire every listener. Runs at most once.
    fn mark_disconnected(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        // Dropping the senders fails every in-flight call with SessionClosed.
        self.pending.lock().clear();

        let listeners: Vec<DisconnectCallback> =
            self.listeners.lock().drain().map(|(_, cb)| cb).collect();
        debug!(count = listeners.len(), "CDP connection lost, notifying listeners");
        for callback in listeners {
            callback();
        }
    }

    fn dispatch(&self, msg: CdpMessage) {
        if msg.id.is_none() {
            trace!(method = ?msg.method, session = ?msg.session_id, "CDP event");
            return;
        }
        let Some((id, outcome)) = msg.into_reply() else {
            return;
        };
        let Some(req) = self.pending.lock().remove(&id) else {
            trace!(id, "reply for abandoned request");
            return;
        };
        let result = outcome.map_err(|fault| CdpError::Protocol {
            code: fault.code,
            message: fault.message,
        });
        let _ = req.tx.send(result);
    }
}

/// CDP client for a single browser connection.
pub struct CdpClient {
    /// Browser WebSocket URL.
    browser_ws_url: String,
    channel: Arc<Channel>,
    /// Background task handle.
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at an HTTP debugging endpoint.
    ///
    /// The browser WebSocket URL is discovered via `GET /json/version`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let client = CdpClient::connect("http://localhost:9222").await?;
    /// ```
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let version = fetch_version(endpoint).await?;
        debug!("Discovered browser: {}", version.browser);
        Self::connect_ws(&version.web_socket_debugger_url).await
    }

    /// Connect directly to a browser WebSocket debugger URL.
    pub async fn connect_ws(browser_ws_url: &str) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(browser_ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let channel = Arc::new(Channel {
            ws_tx: tokio::sync::Mutex::new(ws_sink),
            request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
        });

        let recv_task = {
            let channel = channel.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, &channel).await;
                channel.mark_disconnected();
            })
        };

        debug!("CDP client connected to {}", browser_ws_url);

        Ok(Self {
            browser_ws_url: browser_ws_url.to_string(),
            channel,
            recv_task,
        })
    }

    /// WebSocket receive loop. Returns when the socket closes.
    async fn receive_loop(mut ws_source: WsSource, channel: &Channel) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    match serde_json::from_str::<CdpMessage>(&text) {
                        Ok(resp) => channel.dispatch(resp),
                        Err(e) => warn!("Failed to parse CDP message: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    /// Send a browser-level CDP command.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.channel.call(method, params, None).await
    }

    /// Get browser WebSocket URL.
    pub fn browser_ws_url(&self) -> &str {
        &self.browser_ws_url
    }

    /// Browser product string, e.g. `HeadlessChrome/131.0.6778.85`.
    pub async fn version(&self) -> Result<String, CdpError> {
        let result = self.call("Browser.getVersion", None).await?;
        result["product"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing product".to_string()))
    }

    /// Get all targets.
    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>, CdpError> {
        let result = self.call("Target.getTargets", None).await?;
        let targets: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())?;
        Ok(targets)
    }

    /// Attach to an existing page with a flattened session.
    pub async fn attach_page(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let session = PageSession::new(target_id.to_string(), session_id, self.channel.clone());
        session.enable_domains().await?;

        Ok(session)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Register a callback fired once when the connection drops.
    ///
    /// Fires immediately when the connection is already gone.
    pub fn on_disconnect(&self, callback: DisconnectCallback) -> ListenerId {
        let id = self.channel.next_listener.fetch_add(1, Ordering::SeqCst);
        if !self.channel.is_connected() {
            callback();
            return id;
        }
        self.channel.listeners.lock().insert(id, callback);
        id
    }

    pub fn remove_disconnect_listener(&self, id: ListenerId) {
        self.channel.listeners.lock().remove(&id);
    }

    /// Close the WebSocket. Listeners fire as the connection goes down.
    pub async fn close(&self) -> Result<(), CdpError> {
        if !self.channel.is_connected() {
            return Ok(());
        }
        let result = {
            let mut ws = self.channel.ws_tx.lock().await;
            ws.close().await
        };
        self.channel.mark_disconnected();
        result.map_err(CdpError::from)
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// Fetch `/json/version` from an HTTP debugging endpoint.
pub(crate) async fn fetch_version(endpoint: &str) -> Result<BrowserVersion, CdpError> {
    let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    debug!("Fetching browser version from {}", version_url);

    reqwest::get(&version_url)
        .await
        .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
        .error_for_status()
        .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
        .json()
        .await
        .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))
}
