//! Page subcommands: resolve a page through the pool and run the engine
//! against it.

use std::sync::Arc;

use pagesense_config::Config;
use pagesense_core::{
    ConnectionPool, ExamplePoint, ExtractionMode, LocatedPage, PageLocator, PageSource,
    PatternGeneralizer, Property, ScrollDirection, Segmenter, StabilityDetector,
};
use pagesense_protocols::PerceptionError;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Commands;

/// Everything a page command needs, built once from the config.
pub(crate) struct Engine {
    pub pool: Arc<ConnectionPool>,
    locator: PageLocator,
    detector: StabilityDetector,
    segmenter: Segmenter,
    generalizer: PatternGeneralizer,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(config: &Config, pool: Arc<ConnectionPool>, cancel: CancellationToken) -> Self {
        Self {
            pool,
            locator: PageLocator::new(config.locator.clone(), config.viewport),
            detector: StabilityDetector::from_config(config),
            segmenter: Segmenter::from_config(config),
            generalizer: PatternGeneralizer::from_config(config),
            cancel,
        }
    }

    async fn source(
        &self,
        endpoint: &str,
        session: &str,
        index: Option<usize>,
    ) -> Result<LocatedPage, PerceptionError> {
        let handle = self.pool.acquire(endpoint, session).await?;
        Ok(self.locator.source(handle, index))
    }
}

/// Run a page command and return its JSON output.
pub(crate) async fn run(
    engine: &Engine,
    endpoint: &str,
    session: &str,
    command: Commands,
) -> Result<Value, PerceptionError> {
    match command {
        Commands::Pages => pages(engine, endpoint, session).await,
        Commands::Segment { index, full_page } => {
            let mode = if full_page {
                ExtractionMode::FullPage
            } else {
                ExtractionMode::Viewport
            };
            segment(engine, &engine.source(endpoint, session, index).await?, mode).await
        }
        Commands::Settle { index } => {
            let source = engine.source(endpoint, session, index).await?;
            let outcome = engine.detector.wait_until_stable(&source, &engine.cancel).await?;
            Ok(json!(outcome.to_result()))
        }
        Commands::Scroll { direction, index } => {
            scroll(engine, &engine.source(endpoint, session, index).await?, direction).await
        }
        Commands::Generalize {
            points,
            properties,
            index,
        } => {
            let source = engine.source(endpoint, session, index).await?;
            generalize(engine, &source, &points, &properties).await
        }
        Commands::CheckConfig => Err(PerceptionError::InvalidInput(
            "check-config does not take a page".to_string(),
        )),
    }
}

async fn pages(engine: &Engine, endpoint: &str, session: &str) -> Result<Value, PerceptionError> {
    let handle = engine.pool.acquire(endpoint, session).await?;
    let focused = engine.locator.current(&handle).await?;
    let pages = handle.browser().pages().await?;

    let mut listed = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let url = match page.url().await {
            Ok(url) => url,
            Err(e) => {
                warn!(page = page.id(), "Could not read page URL: {}", e);
                String::new()
            }
        };
        listed.push(json!({ "index": i, "id": page.id(), "url": url }));
    }
    Ok(json!({ "focused": focused.index, "total": focused.total, "pages": listed }))
}

async fn segment(
    engine: &Engine,
    source: &LocatedPage,
    mode: ExtractionMode,
) -> Result<Value, PerceptionError> {
    let outcome = engine.detector.wait_until_stable(source, &engine.cancel).await?;
    if !outcome.settled {
        info!(reason = %outcome.reason, "Page did not settle, segmenting anyway");
    }
    let page = source.resolve().await?;
    let segments = engine.segmenter.segment_mode(page.as_ref(), mode).await?;
    Ok(json!(segments))
}

async fn scroll(
    engine: &Engine,
    source: &LocatedPage,
    direction: ScrollDirection,
) -> Result<Value, PerceptionError> {
    let outcome = engine
        .detector
        .wait_until_stable_for_scroll(source, direction, &engine.cancel)
        .await?;
    Ok(json!(outcome.to_result()))
}

async fn generalize(
    engine: &Engine,
    source: &LocatedPage,
    points: &[ExamplePoint],
    properties: &[Property],
) -> Result<Value, PerceptionError> {
    let page = source.resolve().await?;
    let generalization = engine
        .generalizer
        .generalize(page.as_ref(), points, properties)
        .await?;
    Ok(serde_json::to_value(generalization)?)
}
