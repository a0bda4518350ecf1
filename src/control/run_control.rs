//! Run-wide cancellation flags
//!
//! Two independent flags decide when a run winds down:
//! - "stop requested": set by an external interrupt
//! - "goal reached": set once, by whichever worker first observes saturation
//!
//! Setting either flag cancels a shared [`CancellationToken`], which wakes
//! backoff sleeps and unstarted tasks. Requests already in flight are left
//! to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct RunControl {
    stop_requested: AtomicBool,
    goal_reached: AtomicBool,
    token: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the run as externally stopped
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.token.cancel();
    }

    /// Sets the goal-reached flag
    ///
    /// # Returns
    ///
    /// `true` only for the call that actually flipped the flag, so callers
    /// can log the event exactly once.
    pub fn signal_goal_reached(&self) -> bool {
        let first = self
            .goal_reached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            self.token.cancel();
        }
        first
    }

    /// Handles a process-level interrupt by setting both flags
    pub fn interrupt(&self) {
        self.request_stop();
        self.goal_reached.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn is_goal_reached(&self) -> bool {
        self.goal_reached.load(Ordering::SeqCst)
    }

    /// Returns true if no new work should be started
    pub fn should_stop(&self) -> bool {
        self.is_stop_requested() || self.is_goal_reached()
    }

    /// Token cancelled as soon as either flag is set
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Creates a token that is cancelled with the run, or earlier on its own
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Sleeps for `duration` unless the run is cancelled first
    ///
    /// # Returns
    ///
    /// * `true` - The full duration elapsed
    /// * `false` - The run was cancelled during the wait
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.should_stop() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.token.cancelled() => false,
        }
    }
}
