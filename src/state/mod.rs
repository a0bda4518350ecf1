//! State module for tracking harvest progress
//!
//! This module provides durable, crash-safe tracking of work items.
//!
//! # Components
//!
//! - `ItemState` / `WorkItem`: the unit of work and its derived state
//! - `CrawlCheckpoint` / `CheckpointFile`: the on-disk snapshot and its atomic writer
//! - `CrawlState`: the reservation sets shared by every worker

mod checkpoint;
mod crawl_state;
mod item_state;

use thiserror::Error;

// Re-export main types
pub use checkpoint::{read_checkpoint, CheckpointFile, CrawlCheckpoint};
pub use crawl_state::{CrawlState, StateCounts};
pub use item_state::{ItemState, WorkItem};

/// Errors raised while persisting state
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
