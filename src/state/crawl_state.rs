//! In-memory reservation sets backed by a durable checkpoint

use crate::state::checkpoint::{CheckpointFile, CrawlCheckpoint};
use crate::state::item_state::{ItemState, WorkItem};
use crate::state::StateError;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StateSets {
    processed: HashSet<u64>,
    reserved: HashSet<u64>,
    failed: HashSet<u64>,
    /// Ids that failed during this run; never persisted
    failed_in_run: HashSet<u64>,
    total_accepted: u64,
    last_batch_index: u64,
}

impl StateSets {
    /// Rebuilds the sets of a new run
    ///
    /// Reservations on disk belong to a run that no longer exists, so they
    /// are dropped and those ids become unprocessed again.
    fn from_checkpoint(checkpoint: &CrawlCheckpoint) -> Self {
        let mut sets = Self {
            processed: checkpoint.processed.iter().copied().collect(),
            failed: checkpoint.failed.iter().copied().collect(),
            total_accepted: checkpoint.total_accepted,
            last_batch_index: checkpoint.last_batch_index,
            ..Self::default()
        };
        // An id that reached both terminal sets on disk keeps the success.
        let processed = &sets.processed;
        sets.failed.retain(|id| !processed.contains(id));
        sets
    }

    fn state_of(&self, id: u64) -> ItemState {
        if self.reserved.contains(&id) {
            ItemState::Reserved
        } else if self.processed.contains(&id) {
            ItemState::Processed
        } else if self.failed.contains(&id) {
            ItemState::Failed
        } else {
            ItemState::Unprocessed
        }
    }

    fn to_checkpoint(&self) -> CrawlCheckpoint {
        CrawlCheckpoint {
            processed: self.processed.iter().copied().collect(),
            reserved: self.reserved.iter().copied().collect(),
            failed: self.failed.iter().copied().collect(),
            total_accepted: self.total_accepted,
            last_batch_index: self.last_batch_index,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Tally of the three id sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub processed: usize,
    pub reserved: usize,
    pub failed: usize,
}

/// Tracks which ids are reserved, processed or failed
///
/// Every mutation and every snapshot taken for saving goes through the same
/// lock, so reservation is exclusive and checkpoints are never torn. Writers
/// of the checkpoint file are additionally serialized by `save_lock`, which
/// keeps the file I/O outside the set lock.
#[derive(Debug)]
pub struct CrawlState {
    file: CheckpointFile,
    sets: Mutex<StateSets>,
    save_lock: Mutex<()>,
}

impl CrawlState {
    /// Creates an empty state bound to the given primary checkpoint path
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            file: CheckpointFile::new(checkpoint_path),
            sets: Mutex::new(StateSets::default()),
            save_lock: Mutex::new(()),
        }
    }

    pub fn checkpoint_file(&self) -> &CheckpointFile {
        &self.file
    }

    fn sets(&self) -> MutexGuard<'_, StateSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the in-memory sets with the persisted checkpoint
    ///
    /// Falls back to the backup file, then to an empty state. Never fails.
    pub fn load(&self) -> CrawlCheckpoint {
        let (checkpoint, source) = self.file.load();
        match &source {
            Some(path) => tracing::info!(
                "Loaded state from {}: {} processed, {} reserved, {} failed, {} accepted",
                path.display(),
                checkpoint.processed.len(),
                checkpoint.reserved.len(),
                checkpoint.failed.len(),
                checkpoint.total_accepted
            ),
            None => tracing::info!("Starting with empty state"),
        }

        if !checkpoint.reserved.is_empty() {
            tracing::warn!(
                "{} ids were still reserved by an interrupted run, offering them again",
                checkpoint.reserved.len()
            );
        }

        *self.sets() = StateSets::from_checkpoint(&checkpoint);
        checkpoint
    }

    /// Atomically claims an id for processing
    ///
    /// # Returns
    ///
    /// * `true` - The caller now owns the reservation
    /// * `false` - The id is reserved, processed, or already failed in this run
    ///
    /// An id that failed on an earlier run is claimed again and leaves the
    /// failed set while reserved.
    pub fn reserve(&self, id: u64) -> bool {
        let mut sets = self.sets();
        if sets.processed.contains(&id)
            || sets.reserved.contains(&id)
            || sets.failed_in_run.contains(&id)
        {
            return false;
        }
        sets.failed.remove(&id);
        sets.reserved.insert(id);
        tracing::trace!("Reserved {}", id);
        true
    }

    /// Drops a reservation without recording an outcome
    pub fn release(&self, id: u64) {
        self.sets().reserved.remove(&id);
        tracing::trace!("Released {}", id);
    }

    /// Records the terminal outcome of a reserved id
    pub fn mark_processed(&self, id: u64, success: bool) {
        let mut sets = self.sets();
        sets.reserved.remove(&id);
        if success {
            sets.failed.remove(&id);
            sets.failed_in_run.remove(&id);
            sets.processed.insert(id);
        } else {
            sets.processed.remove(&id);
            sets.failed.insert(id);
            sets.failed_in_run.insert(id);
        }
        tracing::trace!("Marked {} as {}", id, if success { "processed" } else { "failed" });
    }

    /// Marks ids as processed without a reservation
    ///
    /// Used to reconcile ids already present in the detail output.
    pub fn absorb_processed(&self, ids: impl IntoIterator<Item = u64>) {
        let mut sets = self.sets();
        for id in ids {
            sets.reserved.remove(&id);
            sets.failed.remove(&id);
            sets.failed_in_run.remove(&id);
            sets.processed.insert(id);
        }
    }

    /// Returns the items eligible for scheduling
    ///
    /// Processed and reserved ids are filtered out; failed ids are offered again.
    pub fn remaining_work(&self, all_items: &[WorkItem]) -> Vec<WorkItem> {
        let remaining: Vec<WorkItem> = {
            let sets = self.sets();
            all_items
                .iter()
                .filter(|item| sets.state_of(item.id).is_schedulable())
                .cloned()
                .collect()
        };

        let counts = self.counts();
        tracing::info!(
            "Remaining items: {}/{} (processed: {}, reserved: {}, failed: {})",
            remaining.len(),
            all_items.len(),
            counts.processed,
            counts.reserved,
            counts.failed
        );
        remaining
    }

    pub fn state_of(&self, id: u64) -> ItemState {
        self.sets().state_of(id)
    }

    pub fn counts(&self) -> StateCounts {
        let sets = self.sets();
        StateCounts {
            processed: sets.processed.len(),
            reserved: sets.reserved.len(),
            failed: sets.failed.len(),
        }
    }

    pub fn set_total_accepted(&self, total: u64) {
        self.sets().total_accepted = total;
    }

    pub fn set_last_batch_index(&self, index: u64) {
        self.sets().last_batch_index = index;
    }

    /// Takes a consistent copy of the current sets
    pub fn snapshot(&self) -> CrawlCheckpoint {
        self.sets().to_checkpoint()
    }

    /// Persists the current state to the checkpoint file
    ///
    /// Safe to call while workers mutate the sets. `force` only raises the
    /// log level of the success message.
    pub fn save(&self, force: bool) -> Result<(), StateError> {
        let _writer = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let checkpoint = self.snapshot();

        match self.file.write(&checkpoint) {
            Ok(()) => {
                if force {
                    tracing::info!(
                        "State saved: {} processed, {} reserved, {} failed",
                        checkpoint.processed.len(),
                        checkpoint.reserved.len(),
                        checkpoint.failed.len()
                    );
                } else {
                    tracing::debug!("Checkpoint written to {}", self.file.primary().display());
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Failed to save state to {}: {}",
                    self.file.primary().display(),
                    e
                );
                Err(e)
            }
        }
    }
}
