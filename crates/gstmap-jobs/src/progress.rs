//! Lock-free progress counters.
//!
//! One `Progress` is shared between a worker and every poller of the job's
//! status. Counters only ever grow; a snapshot taken mid-update may lag by
//! one record but never goes backwards.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared counters updated by a worker as it processes records.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicU64,
    total_set: AtomicBool,
    processed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
}

impl Progress {
    /// Publish the planned record count once it is known.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.total_set.store(true, Ordering::Release);
    }

    /// Count one record that completed successfully.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one record that exhausted its retries.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Rebuild counters from a persisted snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        let progress = Self::default();
        if let Some(total) = snapshot.total {
            progress.set_total(total);
        }
        progress.processed.store(snapshot.processed, Ordering::Relaxed);
        progress.successful.store(snapshot.successful, Ordering::Relaxed);
        progress.failed.store(snapshot.failed, Ordering::Relaxed);
        progress
    }

    /// A point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = if self.total_set.load(Ordering::Acquire) {
            Some(self.total.load(Ordering::Relaxed))
        } else {
            None
        };
        ProgressSnapshot {
            total,
            processed: self.processed.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Planned record count; `None` until the worker has sized its run.
    pub total: Option<u64>,
    /// Records with a recorded outcome.
    pub processed: u64,
    /// Records that completed successfully.
    pub successful: u64,
    /// Records that exhausted their retries.
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_hidden_until_set() {
        let progress = Progress::default();
        assert_eq!(progress.snapshot().total, None);
        progress.set_total(5);
        assert_eq!(progress.snapshot().total, Some(5));
    }

    #[test]
    fn test_counters_accumulate() {
        let progress = Progress::default();
        progress.set_total(3);
        progress.record_success();
        progress.record_success();
        progress.record_failure();

        let snap = progress.snapshot();
        assert_eq!(snap.processed, 3);
        assert_eq!(snap.successful, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.processed, snap.successful + snap.failed);
    }
}
