//! Error types for the pagesense protocol layer.

mod browser;
mod perception;

pub use browser::*;
pub use perception::*;
