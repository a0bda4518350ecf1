//! Configuration module for the harvester
//!
//! This module handles loading, parsing, clamping and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvester will use {} workers", config.harvest.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, FilterConfig, HarvestConfig, OutputConfig, ProxyConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

// Re-export the checks so command-line overrides can be re-applied
pub use validation::{clamp, validate};
