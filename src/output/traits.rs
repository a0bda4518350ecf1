//! Output sink trait and errors
//!
//! This module defines the interface every record destination implements.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only destination for harvested records
///
/// Implementations must be thread-safe: concurrent `append` calls must never
/// interleave partial records.
pub trait RecordSink: Send + Sync {
    /// Appends one record as a complete unit
    fn append(&self, record: &Value) -> OutputResult<()>;

    /// Human-readable location of the sink, for logging
    fn describe(&self) -> String;
}
