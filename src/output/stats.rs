//! Run summaries and checkpoint statistics
//!
//! This module provides the final tallies of a run and the `--stats` view of
//! a saved checkpoint.

use crate::state::{CrawlCheckpoint, StateCounts};

/// Final tallies of a harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Accepted items, including those found in existing output
    pub accepted: u64,

    /// The configured goal
    pub target: u64,

    /// Ids in the processed set
    pub processed: usize,

    /// Ids in the failed set (offered again next run)
    pub failed: usize,

    /// Ids still reserved at exit (an interrupted in-flight item)
    pub reserved: usize,
}

impl RunSummary {
    pub fn new(accepted: u64, target: u64, counts: StateCounts) -> Self {
        Self {
            accepted,
            target,
            processed: counts.processed,
            failed: counts.failed,
            reserved: counts.reserved,
        }
    }

    pub fn goal_met(&self) -> bool {
        self.accepted >= self.target
    }

    /// Writes the summary to the log
    pub fn log(&self) {
        tracing::info!("===== Harvest finished =====");
        tracing::info!("Accepted items: {}/{}", self.accepted, self.target);
        tracing::info!("Processed ids: {}", self.processed);
        tracing::info!("Failed ids: {}", self.failed);
        tracing::info!("Still reserved ids: {}", self.reserved);

        if self.goal_met() {
            tracing::info!("Goal of {} items reached", self.target);
        } else {
            tracing::info!("Goal partially reached: {}/{}", self.accepted, self.target);
        }

        if self.failed > 0 {
            tracing::info!("{} failed ids will be offered again on the next run", self.failed);
        }

        if self.reserved > 0 {
            tracing::warn!(
                "{} ids were left reserved (interrupted); run again to reprocess them",
                self.reserved
            );
        }
    }
}

/// Statistics computed from a saved checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStatistics {
    pub processed: usize,
    pub failed: usize,
    pub reserved: usize,
    pub total_accepted: u64,
    pub last_batch_index: u64,
    pub saved_at: Option<String>,
}

impl From<&CrawlCheckpoint> for CheckpointStatistics {
    fn from(checkpoint: &CrawlCheckpoint) -> Self {
        Self {
            processed: checkpoint.processed.len(),
            failed: checkpoint.failed.len(),
            reserved: checkpoint.reserved.len(),
            total_accepted: checkpoint.total_accepted,
            last_batch_index: checkpoint.last_batch_index,
            saved_at: checkpoint.timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

impl CheckpointStatistics {
    /// Share of terminal ids that ended processed, as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.processed + self.failed;
        if terminal == 0 {
            return 0.0;
        }
        self.processed as f64 / terminal as f64 * 100.0
    }
}

/// Prints checkpoint statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CheckpointStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Checkpoint:");
    println!(
        "  Saved at: {}",
        stats.saved_at.as_deref().unwrap_or("never")
    );
    println!("  Last batch index: {}", stats.last_batch_index);
    println!();

    println!("Items:");
    println!("  Accepted: {}", stats.total_accepted);
    println!("  Processed: {}", stats.processed);
    println!("  Failed (retried next run): {}", stats.failed);
    println!("  Reserved (interrupted): {}", stats.reserved);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} ids processed)",
        stats.success_rate(),
        stats.processed,
        stats.processed + stats.failed
    );
}
