//! Output module for harvested records and run reporting
//!
//! This module handles:
//! - Appending detail and review records to JSONL files
//! - Reconciling ids already present in earlier output
//! - Periodic progress reports and the final run summary

mod jsonl;
mod progress;
pub mod stats;
mod traits;

pub use jsonl::{scan_existing_ids, JsonlSink};
pub use progress::{ProgressReporter, ProgressSnapshot, REPORT_INTERVAL};
pub use stats::{print_statistics, CheckpointStatistics, RunSummary};
pub use traits::{OutputError, OutputResult, RecordSink};
