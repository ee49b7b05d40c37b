//! Segmentation: splits a page into labeled, geometrically located
//! regions.

mod classify;
mod dedupe;
mod traversal;
mod urls;

pub(crate) use traversal::Traversal;

use pagesense_config::{Config, SegmenterConfig};
use pagesense_protocols::{BoundingBox, PerceptionError, RemotePage, Segment};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::DomSnapshot;
use dedupe::annotate_duplicates;

/// Which part of the page to segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Only segments fully inside the current viewport.
    #[default]
    Viewport,
    FullPage,
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.segmenter.clone())
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment the live page, keeping only segments fully inside `region`
    /// (page coordinates) when one is given.
    pub async fn segment(
        &self,
        page: &dyn RemotePage,
        region: Option<BoundingBox>,
    ) -> Result<Vec<Segment>, PerceptionError> {
        let snapshot = DomSnapshot::capture(page, &[]).await?;
        Ok(self.segment_snapshot(&snapshot, region))
    }

    pub async fn segment_mode(
        &self,
        page: &dyn RemotePage,
        mode: ExtractionMode,
    ) -> Result<Vec<Segment>, PerceptionError> {
        let snapshot = DomSnapshot::capture(page, &[]).await?;
        let region = match mode {
            ExtractionMode::Viewport => snapshot.main().map(|d| d.viewport_box()),
            ExtractionMode::FullPage => None,
        };
        Ok(self.segment_snapshot(&snapshot, region))
    }

    /// Segment an already captured snapshot. Deterministic for a given
    /// snapshot and region.
    pub fn segment_snapshot(
        &self,
        snapshot: &DomSnapshot,
        region: Option<BoundingBox>,
    ) -> Vec<Segment> {
        let mut segments = Traversal::new(snapshot, &self.config).run();
        let emitted = segments.len();
        if let Some(region) = region {
            segments.retain(|s| region.contains_box(&s.bbox));
        }
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.index = index;
        }
        annotate_duplicates(snapshot, &mut segments);

        debug!(
            url = %snapshot.url,
            emitted,
            kept = segments.len(),
            "Segmented page"
        );
        segments
    }
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
