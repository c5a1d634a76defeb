//! Statistics and metrics for the broadcast pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live pipeline counters
///
/// Shared by both workers; every counter is a relaxed atomic.
#[derive(Debug)]
pub struct PipelineStats {
    started_at: Instant,
    polls: AtomicU64,
    upstream_errors: AtomicU64,
    changes: AtomicU64,
    dropped: AtomicU64,
    broadcasts: AtomicU64,
    sends: AtomicU64,
    send_failures: AtomicU64,
    worker_restarts: AtomicU64,
}

impl PipelineStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            polls: AtomicU64::new(0),
            upstream_errors: AtomicU64::new(0),
            changes: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            sends: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            worker_restarts: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_change(&self) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self, delivered: usize, failed: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.sends.fetch_add(delivered as u64, Ordering::Relaxed);
        self.send_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_restart(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            polls: self.polls.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            changes: self.changes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the counters were created
    pub uptime: Duration,
    /// Upstream reads attempted
    pub polls: u64,
    /// Upstream reads that failed
    pub upstream_errors: u64,
    /// Detected changes that made it into the queue
    pub changes: u64,
    /// Payloads dropped because a bounded queue was full
    pub dropped: u64,
    /// Broadcast cycles completed
    pub broadcasts: u64,
    /// Successful sends across all connections
    pub sends: u64,
    /// Failed sends across all connections
    pub send_failures: u64,
    /// Worker loop iterations that panicked and were restarted
    pub worker_restarts: u64,
}

impl StatsSnapshot {
    /// Fraction of polls that produced a change
    pub fn change_ratio(&self) -> f64 {
        if self.polls > 0 {
            self.changes as f64 / self.polls as f64
        } else {
            0.0
        }
    }

    /// Average successful sends per broadcast cycle
    pub fn fanout(&self) -> f64 {
        if self.broadcasts > 0 {
            self.sends as f64 / self.broadcasts as f64
        } else {
            0.0
        }
    }
}
