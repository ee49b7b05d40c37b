//! Errors surfaced by the perception engine.

use thiserror::Error;

use super::BrowserError;

/// Perception engine errors.
///
/// Retryable conditions carry their own bounded budgets inside the engine;
/// what reaches a caller is either budget exhaustion or invalid input.
#[derive(Debug, Error)]
pub enum PerceptionError {
    /// Endpoint unreachable after every connect attempt.
    #[error("Connection error: {endpoint} unreachable after {attempts} attempts: {message}")]
    Connection {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// A pooled handle failed its liveness probe.
    #[error("Stale connection for session {0}")]
    StaleConnection(String),

    /// The page kept navigating away while being measured.
    #[error("Navigation race: execution context destroyed {attempts} times")]
    NavigationRace { attempts: u32 },

    /// The browser has no open pages.
    #[error("No page available")]
    NoPage,

    /// Requested page index does not exist.
    #[error("Page index {index} out of bounds ({total} pages)")]
    IndexOutOfBounds { index: usize, total: usize },

    /// Screenshot capture exceeded its timeout.
    #[error("Screenshot capture timed out after {0}ms")]
    CaptureTimeout(u64),

    /// A single node could not be classified.
    #[error("Classification error: {0}")]
    Classification(String),

    /// No usable template could be derived from the examples.
    #[error("Template generalization failed: {0}")]
    TemplateGeneralization(String),

    /// Caller supplied unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PerceptionError {
    /// Errors caused by the caller rather than the page or transport.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PerceptionError::NoPage
                | PerceptionError::IndexOutOfBounds { .. }
                | PerceptionError::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = PerceptionError::Connection {
            endpoint: "http://fleet:9222".to_string(),
            attempts: 3,
            message: "refused".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("fleet:9222"));
        assert!(display.contains("3 attempts"));
    }

    #[test]
    fn test_browser_error_from() {
        let err = PerceptionError::from(BrowserError::Closed);
        assert!(err.to_string().contains("Browser error"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(PerceptionError::IndexOutOfBounds { index: 4, total: 2 }.is_caller_error());
        assert!(PerceptionError::InvalidInput("empty".to_string()).is_caller_error());
        assert!(PerceptionError::NoPage.is_caller_error());
        assert!(!PerceptionError::NavigationRace { attempts: 2 }.is_caller_error());
    }

    #[test]
    fn test_index_out_of_bounds_display() {
        let err = PerceptionError::IndexOutOfBounds { index: 5, total: 3 };
        assert_eq!(err.to_string(), "Page index 5 out of bounds (3 pages)");
    }
}
