//! Bounded counter of accepted items

use std::sync::{Mutex, PoisonError};

/// Counts accepted items against a fixed goal
///
/// `increment` performs its check and its update under one lock, so
/// concurrent callers can never push the value past `max`.
#[derive(Debug)]
pub struct GoalCounter {
    value: Mutex<u64>,
    max: u64,
}

impl GoalCounter {
    /// Creates a counter starting at `initial` with goal `max`
    pub fn new(initial: u64, max: u64) -> Self {
        Self {
            value: Mutex::new(initial),
            max,
        }
    }

    /// Claims one slot toward the goal
    ///
    /// # Returns
    ///
    /// `(true, new_value)` if a slot was claimed, `(false, current_value)` if
    /// the goal was already met.
    pub fn increment(&self) -> (bool, u64) {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if *value >= self.max {
            return (false, *value);
        }
        *value += 1;
        (true, *value)
    }

    /// Gives back a previously claimed slot, never going below zero
    pub fn decrement(&self) -> u64 {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value = value.saturating_sub(1);
        *value
    }

    pub fn value(&self) -> u64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Returns true once the goal has been met
    pub fn reached_limit(&self) -> bool {
        self.value() >= self.max
    }
}
