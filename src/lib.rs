//! Catalog Harvester: a resumable, concurrent catalog crawler
//!
//! This crate harvests item details and reviews from a paginated remote
//! catalog, keeping a durable checkpoint of which ids were claimed, accepted
//! or rejected so that interrupted runs resume without duplicating work.

pub mod config;
pub mod control;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod records;
pub mod state;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("State error: {0}")]
    State(#[from] state::StateError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog listing returned no items")]
    EmptyCatalog,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use control::{GoalCounter, RunControl};
pub use crawler::{run_harvest, CatalogApi, Harvester};
pub use output::RunSummary;
pub use state::{CrawlCheckpoint, CrawlState, ItemState, WorkItem};
