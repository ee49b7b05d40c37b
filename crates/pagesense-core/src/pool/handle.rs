//! Pooled connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pagesense_protocols::{ListenerId, RemoteBrowser};
use tokio::time::Instant;

/// A live browser connection owned by the pool.
///
/// Callers hold it only for the duration of a request; closing is reserved
/// to the pool.
pub struct ConnectionHandle {
    endpoint: String,
    session_id: String,
    last_used_at: parking_lot::Mutex<Instant>,
    connected: Arc<AtomicBool>,
    browser: Arc<dyn RemoteBrowser>,
    listener: ListenerId,
}

impl ConnectionHandle {
    pub(crate) fn new(
        endpoint: &str,
        session_id: &str,
        browser: Arc<dyn RemoteBrowser>,
        connected: Arc<AtomicBool>,
        listener: ListenerId,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            session_id: session_id.to_string(),
            last_used_at: parking_lot::Mutex::new(Instant::now()),
            connected,
            browser,
            listener,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn browser(&self) -> &Arc<dyn RemoteBrowser> {
        &self.browser
    }

    /// False once the disconnect callback fired.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn last_used_at(&self) -> Instant {
        *self.last_used_at.lock()
    }

    pub(crate) fn touch(&self) {
        *self.last_used_at.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at())
    }

    pub(crate) fn listener_id(&self) -> ListenerId {
        self.listener
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.endpoint)
            .field("session_id", &self.session_id)
            .field("connected", &self.is_connected())
            .field("listener", &self.listener)
            .finish()
    }
}
