//! Throughput and ETA reporting
//!
//! Purely observational: nothing here feeds back into scheduling.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default minimum time between two reports
pub const REPORT_INTERVAL: Duration = Duration::from_secs(20);

/// One emitted progress report
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub accepted: u64,
    pub target: u64,
    /// Accepted items per minute since the reporter was created
    pub rate_per_minute: f64,
    /// Estimated minutes until the target is met
    pub eta_minutes: f64,
}

impl ProgressSnapshot {
    pub fn percentage(&self) -> f64 {
        if self.target == 0 {
            return 100.0;
        }
        self.accepted as f64 / self.target as f64 * 100.0
    }
}

#[derive(Debug)]
struct Timing {
    started: Instant,
    last_report: Instant,
}

#[derive(Debug)]
pub struct ProgressReporter {
    target: u64,
    interval: Duration,
    timing: Mutex<Timing>,
}

impl ProgressReporter {
    pub fn new(target: u64) -> Self {
        Self::with_interval(target, REPORT_INTERVAL)
    }

    pub fn with_interval(target: u64, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            target,
            interval,
            timing: Mutex::new(Timing {
                started: now,
                last_report: now,
            }),
        }
    }

    /// Logs progress if at least one interval passed since the last report
    ///
    /// # Returns
    ///
    /// The emitted snapshot, or `None` when the call was a no-op.
    pub fn update(&self, accepted: u64) -> Option<ProgressSnapshot> {
        let now = Instant::now();
        let mut timing = self.timing.lock().unwrap_or_else(PoisonError::into_inner);
        if now.duration_since(timing.last_report) < self.interval {
            return None;
        }
        timing.last_report = now;

        if accepted == 0 {
            return None;
        }

        let elapsed = now.duration_since(timing.started).as_secs_f64().max(f64::EPSILON);
        let rate_per_minute = accepted as f64 / elapsed * 60.0;
        let remaining = self.target.saturating_sub(accepted) as f64;
        let snapshot = ProgressSnapshot {
            accepted,
            target: self.target,
            rate_per_minute,
            eta_minutes: remaining / rate_per_minute,
        };

        tracing::info!(
            "Progress: {}/{} items ({:.1}%) | rate: {:.1}/min | ETA: {:.0}min",
            snapshot.accepted,
            snapshot.target,
            snapshot.percentage(),
            snapshot.rate_per_minute,
            snapshot.eta_minutes
        );
        Some(snapshot)
    }
}
