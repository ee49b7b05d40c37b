//! Errors raised by a remote browser implementation.

use thiserror::Error;

/// Messages the browser uses when a page navigated away mid-evaluation.
const CONTEXT_DESTROYED_MARKERS: &[&str] = &[
    "execution context was destroyed",
    "cannot find context with specified id",
    "inspected target navigated or closed",
];

/// Errors from the remote browser boundary.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Protocol error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Execution context destroyed: {0}")]
    ContextDestroyed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    Closed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BrowserError {
    /// Whether the page navigated away while a call was in flight.
    pub fn is_context_destroyed(&self) -> bool {
        match self {
            BrowserError::ContextDestroyed(_) => true,
            BrowserError::JavaScript(msg) | BrowserError::Protocol { message: msg, .. } => {
                is_context_destroyed_message(msg)
            }
            _ => false,
        }
    }
}

/// Check a raw error message for the "context destroyed" family.
pub fn is_context_destroyed_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_DESTROYED_MARKERS.iter().any(|m| lower.contains(m))
}

impl From<serde_json::Error> for BrowserError {
    fn from(e: serde_json::Error) -> Self {
        BrowserError::InvalidResponse(e.to_string())
    }
}
