//! Connection pool: long-lived browser handles keyed by endpoint and session.
//!
//! Each key owns its own async lock, so acquiring, evicting and sweeping are
//! mutually exclusive per key without serializing unrelated sessions.

mod handle;

pub use handle::ConnectionHandle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use pagesense_config::PoolConfig;
use pagesense_protocols::{BrowserConnector, PerceptionError, RemoteBrowser};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pool map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    endpoint: String,
    session_id: String,
}

impl PoolKey {
    fn new(endpoint: &str, session_id: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<ConnectionHandle>>>>;

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles currently held.
    pub handles: usize,
    /// Handles still marked connected.
    pub connected: usize,
    /// Handles marked disconnected and awaiting lazy removal.
    pub disconnected: usize,
    /// Slots locked by an in-flight operation, not inspected.
    pub busy: usize,
}

/// Owns every live browser handle.
pub struct ConnectionPool {
    connector: Arc<dyn BrowserConnector>,
    config: PoolConfig,
    slots: DashMap<PoolKey, Slot>,
    shutdown: CancellationToken,
    sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn BrowserConnector>, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            slots: DashMap::new(),
            shutdown: CancellationToken::new(),
            sweeper: parking_lot::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get a healthy handle for `(endpoint, session_id)`, reusing the pooled
    /// one when it still answers a liveness probe.
    pub async fn acquire(
        &self,
        endpoint: &str,
        session_id: &str,
    ) -> Result<Arc<ConnectionHandle>, PerceptionError> {
        let key = PoolKey::new(endpoint, session_id);

        loop {
            let slot = self.slot(&key);
            let mut guard = slot.lock().await;

            // The sweep may have dropped this slot while we waited.
            if !self.is_current(&key, &slot) {
                continue;
            }

            if let Some(handle) = guard.as_ref() {
                if self.probe(handle).await {
                    handle.touch();
                    debug!(endpoint, session = session_id, "Reusing pooled connection");
                    return Ok(handle.clone());
                }

                let stale = PerceptionError::StaleConnection(session_id.to_string());
                warn!(endpoint, "{}, reconnecting", stale);
                if let Some(handle) = guard.take() {
                    self.dispose(&handle).await;
                }
            }

            let handle = self.connect(endpoint, session_id).await?;
            *guard = Some(handle.clone());
            return Ok(handle);
        }
    }

    /// Close and remove every handle of a session.
    pub async fn close_session(&self, session_id: &str) -> usize {
        let slots: Vec<(PoolKey, Slot)> = self
            .slots
            .iter()
            .filter(|entry| entry.key().session_id == session_id)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut closed = 0;
        for (key, slot) in slots {
            let mut guard = slot.lock().await;
            if let Some(handle) = guard.take() {
                self.dispose(&handle).await;
                closed += 1;
            }
            self.slots.remove_if(&key, |_, s| Arc::ptr_eq(s, &slot));
        }

        if closed > 0 {
            info!(session = session_id, closed, "Closed session connections");
        }
        closed
    }

    /// Alias of [`close_session`](Self::close_session) used on session teardown.
    pub async fn release(&self, session_id: &str) -> usize {
        self.close_session(session_id).await
    }

    /// Close handles idle beyond the TTL or already disconnected.
    ///
    /// Slots busy with an acquire are in use and skipped.
    pub async fn sweep(&self) -> usize {
        let ttl = self.config.idle_ttl();
        let now = Instant::now();

        let slots: Vec<(PoolKey, Slot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut swept = 0;
        for (key, slot) in slots {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };

            let expired = match guard.as_ref() {
                Some(handle) => !handle.is_connected() || handle.idle_for(now) >= ttl,
                None => true,
            };
            if !expired {
                continue;
            }

            if let Some(handle) = guard.take() {
                debug!(
                    endpoint = %handle.endpoint(),
                    session = %handle.session_id(),
                    connected = handle.is_connected(),
                    "Sweeping idle connection"
                );
                self.dispose(&handle).await;
                swept += 1;
            }
            self.slots.remove_if(&key, |_, s| Arc::ptr_eq(s, &slot));
        }

        swept
    }

    /// Start the periodic idle sweep on the current runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let pool = Arc::downgrade(self);
        let token = self.shutdown.child_token();
        let period = self.config.sweep_interval();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        let swept = pool.sweep().await;
                        if swept > 0 {
                            info!("Swept {} idle connections", swept);
                        }
                    }
                }
            }
            debug!("Connection sweeper stopped");
        });

        if let Some(previous) = self.sweeper.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop the sweeper and close every handle.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.sweeper.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        self.slots.clear();
        for slot in slots {
            if let Some(handle) = slot.lock().await.take() {
                self.dispose(&handle).await;
            }
        }
        info!("Connection pool shut down");
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for entry in self.slots.iter() {
            match entry.value().try_lock() {
                Ok(guard) => {
                    if let Some(handle) = guard.as_ref() {
                        stats.handles += 1;
                        if handle.is_connected() {
                            stats.connected += 1;
                        } else {
                            stats.disconnected += 1;
                        }
                    }
                }
                Err(_) => stats.busy += 1,
            }
        }
        stats
    }

    fn slot(&self, key: &PoolKey) -> Slot {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn is_current(&self, key: &PoolKey, slot: &Slot) -> bool {
        self.slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }

    async fn probe(&self, handle: &ConnectionHandle) -> bool {
        if !handle.is_connected() {
            return false;
        }
        match timeout(self.config.probe_timeout(), handle.browser().version()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(endpoint = %handle.endpoint(), "Liveness probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!(endpoint = %handle.endpoint(), "Liveness probe timed out");
                false
            }
        }
    }

    async fn connect(
        &self,
        endpoint: &str,
        session_id: &str,
    ) -> Result<Arc<ConnectionHandle>, PerceptionError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match timeout(
                self.config.connect_timeout(),
                self.connector.connect(endpoint, session_id),
            )
            .await
            {
                Ok(Ok(browser)) => {
                    info!(endpoint, session = session_id, attempt, "Connected to browser");
                    return Ok(Arc::new(Self::register(endpoint, session_id, browser)));
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "connect timed out after {}ms",
                        self.config.connect_timeout_ms
                    )
                }
            }

            warn!(endpoint, attempt, attempts, "Connect attempt failed: {}", last_error);
            if attempt < attempts {
                sleep(self.config.retry_delay()).await;
            }
        }

        Err(PerceptionError::Connection {
            endpoint: endpoint.to_string(),
            attempts,
            message: last_error,
        })
    }

    fn register(
        endpoint: &str,
        session_id: &str,
        browser: Arc<dyn RemoteBrowser>,
    ) -> ConnectionHandle {
        let connected = Arc::new(AtomicBool::new(true));
        let flag = connected.clone();
        let listener = browser.on_disconnect(Arc::new(move || {
            flag.store(false, Ordering::SeqCst);
        }));
        ConnectionHandle::new(endpoint, session_id, browser, connected, listener)
    }

    /// Drop the disconnect listener, then close. Close failures are logged.
    async fn dispose(&self, handle: &ConnectionHandle) {
        handle.browser().remove_disconnect_listener(handle.listener_id());
        match timeout(self.config.probe_timeout(), handle.browser().close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(endpoint = %handle.endpoint(), "Close failed: {}", e),
            Err(_) => debug!(endpoint = %handle.endpoint(), "Close timed out"),
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
