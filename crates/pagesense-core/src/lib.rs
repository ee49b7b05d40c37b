//! # pagesense core
//!
//! The page perception and stability engine:
//!
//! - [`ConnectionPool`] keeps long-lived browser handles healthy per
//!   `(endpoint, session)` key.
//! - [`PageLocator`] resolves the focused page or the page at an index.
//! - [`StabilityDetector`] waits until a page stops changing visually, and
//!   settles scrolls.
//! - [`Segmenter`] reduces a page to a flat list of labeled segments.
//! - [`PatternGeneralizer`] turns example points into a repeated-record
//!   template and extracts every record.

pub mod dom;
pub mod generalize;
pub mod locator;
pub mod pool;
pub mod segment;
pub mod stability;

#[cfg(test)]
pub(crate) mod testing;

pub use dom::DomSnapshot;
pub use generalize::{
    ExamplePoint, Generalization, PatternGeneralizer, Property, RepeatedTemplate,
    TemplateStrategy,
};
pub use locator::{LocatedPage, PageLocator, ResolvedPage};
pub use pool::{ConnectionHandle, ConnectionPool, PoolStats};
pub use segment::{ExtractionMode, Segmenter};
pub use stability::{FixedPage, PageSource, ScrollDirection, StabilityDetector};
