//! Durable checkpoint file handling
//!
//! A checkpoint lives at a primary path with two siblings:
//! - `<primary>.backup`: the previous primary, rotated before each write
//! - `<primary>.tmp`: the new content, renamed over the primary once complete
//!
//! A crash at any point leaves either the old state (in the backup) or the
//! new state (in the primary) readable.

use crate::state::StateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable snapshot of harvest progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    #[serde(default)]
    pub processed: BTreeSet<u64>,

    #[serde(default)]
    pub reserved: BTreeSet<u64>,

    #[serde(default)]
    pub failed: BTreeSet<u64>,

    #[serde(default)]
    pub total_accepted: u64,

    #[serde(default)]
    pub last_batch_index: u64,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The primary, backup and temporary paths of one checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    primary: PathBuf,
    backup: PathBuf,
    tmp: PathBuf,
}

impl CheckpointFile {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        let primary = primary.into();
        Self {
            backup: with_suffix(&primary, ".backup"),
            tmp: with_suffix(&primary, ".tmp"),
            primary,
        }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Loads the primary checkpoint, falling back to the backup
    ///
    /// Never fails: a missing or unreadable pair yields an empty checkpoint.
    ///
    /// # Returns
    ///
    /// The checkpoint and the path it was read from, if any
    pub fn load(&self) -> (CrawlCheckpoint, Option<PathBuf>) {
        for path in [&self.primary, &self.backup] {
            if !path.exists() {
                continue;
            }
            match read_checkpoint(path) {
                Ok(checkpoint) => return (checkpoint, Some(path.clone())),
                Err(e) => {
                    tracing::warn!("Failed to load checkpoint {}: {}", path.display(), e);
                }
            }
        }
        (CrawlCheckpoint::default(), None)
    }

    /// Writes a checkpoint, rotating the current primary into the backup slot
    ///
    /// If the write fails after rotation, the backup is moved back so the
    /// primary is no worse than before the attempt.
    pub fn write(&self, checkpoint: &CrawlCheckpoint) -> Result<(), StateError> {
        if self.primary.exists() {
            if let Err(e) = fs::rename(&self.primary, &self.backup) {
                tracing::warn!("Failed to rotate checkpoint backup: {}", e);
            }
        }

        match self.write_and_swap(checkpoint) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.restore_backup();
                Err(e)
            }
        }
    }

    fn write_and_swap(&self, checkpoint: &CrawlCheckpoint) -> Result<(), StateError> {
        if let Some(parent) = self.primary.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_vec_pretty(checkpoint)?;
        let mut file = fs::File::create(&self.tmp)?;
        file.write_all(&content)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp, &self.primary)?;
        Ok(())
    }

    fn restore_backup(&self) {
        if !self.backup.exists() || self.primary.exists() {
            return;
        }
        match fs::copy(&self.backup, &self.primary) {
            Ok(_) => tracing::info!("Restored checkpoint from {}", self.backup.display()),
            Err(e) => tracing::error!("Failed to restore checkpoint backup: {}", e),
        }
    }

    /// Deletes the primary, backup and temporary files
    pub fn remove_all(&self) -> Result<(), StateError> {
        for path in [&self.primary, &self.backup, &self.tmp] {
            match fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Reads and parses a single checkpoint file
pub fn read_checkpoint(path: &Path) -> Result<CrawlCheckpoint, StateError> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
