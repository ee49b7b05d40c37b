//! Data model produced by the perception engine.

mod geometry;
mod segment;
mod stability;

pub use geometry::{BoundingBox, Point};
pub use segment::{ElementRef, Label, Segment};
pub use stability::{ScrollInfo, SettleReason, StabilityOutcome, StabilityResult};
