//! CLI definitions for pagesense.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagesense_core::{ExamplePoint, Property, ScrollDirection};

/// pagesense CLI.
#[derive(Parser)]
#[command(name = "pagesense")]
#[command(about = "Page perception and stability engine for remotely driven browsers")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults apply when it does not exist)
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Browser debugging endpoint
    #[arg(
        short,
        long,
        env = "PAGESENSE_ENDPOINT",
        default_value = "http://127.0.0.1:9222",
        global = true
    )]
    pub endpoint: String,

    /// Session the pooled connection is keyed by
    #[arg(short, long, default_value = "default", global = true)]
    pub session: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List open pages and the focused one
    Pages,

    /// Wait for the page to settle, then print its segments as JSON
    Segment {
        /// Page index (default: focused page)
        #[arg(long)]
        index: Option<usize>,

        /// Keep segments outside the viewport
        #[arg(long)]
        full_page: bool,
    },

    /// Wait until the page stops changing and print the result
    Settle {
        /// Page index (default: focused page)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Scroll and wait for the position to settle
    Scroll {
        /// top, bottom or next
        direction: ScrollDirection,

        /// Page index (default: focused page)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Extract repeated records from example points
    Generalize {
        /// Example point as x,y or x,y,tag (repeat for each example)
        #[arg(long = "point", required = true)]
        points: Vec<ExamplePoint>,

        /// Property to compare; forces attribute matching (repeatable)
        #[arg(long = "property")]
        properties: Vec<Property>,

        /// Page index (default: focused page)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Validate the configuration file
    CheckConfig,
}
