/// Work item and item state definitions for tracking harvest progress
///
/// This module defines the unit of work and every state it can be in.
use serde::{Deserialize, Serialize};
use std::fmt;

/// One catalog entry, the unit of claim, fetch and persist
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Catalog identifier
    pub id: u64,

    /// Display name from the catalog listing
    #[serde(default)]
    pub name: String,
}

impl WorkItem {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Represents the current state of a work item
///
/// The state is never stored directly; it is derived from membership in the
/// reserved, processed and failed sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Not in any set; eligible for scheduling
    Unprocessed,

    /// Claimed by a worker that has not reached an outcome yet
    Reserved,

    /// Accepted and persisted
    Processed,

    /// Reached a soft failure; offered again on the next run
    Failed,
}

impl ItemState {
    /// Returns true if the item may be handed to a worker
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Unprocessed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Reserved => "reserved",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
