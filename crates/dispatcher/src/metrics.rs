//! Dispatcher metrics for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Approximate number of queued jobs
    queue_len: AtomicUsize,
    /// Tasks accepted by `submit`
    submitted: AtomicU64,
    /// Tasks currently running
    running: AtomicUsize,
    /// Highest observed value of `running`
    peak_running: AtomicUsize,
    /// Tasks finished successfully
    succeeded: AtomicU64,
    /// Tasks finished with a facility failure
    failed: AtomicU64,
    /// Tasks cancelled before running
    cancelled: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Record an accepted submission
    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task entering RUNNING
    pub fn task_started(&self) {
        let now = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_running.fetch_max(now, Ordering::AcqRel);
    }

    /// Record a task leaving RUNNING
    pub fn task_finished(&self, success: bool) {
        self.running.fetch_sub(1, Ordering::AcqRel);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a cancellation
    pub fn inc_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks currently running
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Highest concurrent running count seen
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::Acquire)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            running: self.running(),
            peak_running: self.peak_running(),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub submitted: u64,
    pub running: usize,
    pub peak_running: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_maximum() {
        let metrics = DispatcherMetrics::new();
        metrics.task_started();
        metrics.task_started();
        metrics.task_finished(true);
        metrics.task_started();
        metrics.task_finished(false);
        metrics.task_finished(true);

        let snap = metrics.snapshot();
        assert_eq!(snap.running, 0);
        assert_eq!(snap.peak_running, 2);
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.failed, 1);
    }
}
