//! DOM snapshot: one script evaluation serialises the page into a flat
//! node arena that segmentation and generalization run over.

mod snapshot;

pub use snapshot::{DocumentSnapshot, DomNode, DomSnapshot, HitIndex, NodeKind, NodeStyle, Probe};

use pagesense_protocols::{PerceptionError, Point, RemotePage};
use serde_json::json;
use tracing::debug;

/// Id of the injected mouse-debug cursor element; never captured.
pub const CURSOR_ELEMENT_ID: &str = "__pagesense_mouse_cursor";

/// Serialises the main document and every accessible iframe document.
pub(crate) const SNAPSHOT_SCRIPT: &str = include_str!("snapshot.js");

impl DomSnapshot {
    /// Capture the page. `points` (page coordinates) are hit-tested in the
    /// main document and reported in [`DomSnapshot::points`].
    pub async fn capture(page: &dyn RemotePage, points: &[Point]) -> Result<Self, PerceptionError> {
        let points: Vec<_> = points.iter().map(|p| json!({"x": p.x, "y": p.y})).collect();
        let value = page
            .evaluate(SNAPSHOT_SCRIPT, vec![json!(points), json!(CURSOR_ELEMENT_ID)])
            .await?;
        let snapshot: DomSnapshot = serde_json::from_value(value)?;
        debug!(
            documents = snapshot.documents.len(),
            nodes = snapshot.node_count(),
            "Captured DOM snapshot"
        );
        Ok(snapshot)
    }
}
