//! Job records and lifecycle types.

use crate::progress::ProgressSnapshot;
use chrono::{DateTime, Utc};
use gstmap_core::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// PAN lookups producing per-row results.
    Extraction,
    /// GSTIN detail fetches merged into the details table.
    Enrichment,
}

/// Lifecycle state of a job.
///
/// `Queued` and `Processing` are active; `Completed` and `Failed` are
/// terminal. A cancelled job lands in `Failed` with a cancellation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, waiting for a worker slot.
    Queued,
    /// A worker holds the slot and is processing records.
    Processing,
    /// Every planned record has a recorded outcome.
    Completed,
    /// The run was aborted or cancelled before finishing.
    Failed,
}

impl JobStatus {
    /// Whether the job can still make progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Whether the job has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Caller-supplied knobs for one job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Process a single record and stop; for verifying portal selectors.
    pub test_mode: bool,
    /// Cap on records processed in this run.
    pub limit: Option<u64>,
    /// Continue an interrupted dataset from its checkpoint.
    pub resume: bool,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            headless: true,
            test_mode: false,
            limit: None,
            resume: false,
        }
    }
}

/// Point-in-time view of a job, returned by status polls and persisted in
/// the job history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub id: JobId,
    /// What the job does.
    pub kind: JobKind,
    /// Dataset file the job reads and writes.
    pub dataset: PathBuf,
    /// Knobs the job was submitted with.
    pub params: JobParameters,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// When a worker claimed the job.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure message, set only for `Failed`.
    pub error: Option<String>,
    /// Counter values at snapshot time.
    pub progress: ProgressSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Processing.is_active());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = JobSnapshot {
            id: JobId::generate(),
            kind: JobKind::Extraction,
            dataset: PathBuf::from("dataset.db"),
            params: JobParameters::default(),
            status: JobStatus::Completed,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: Some(Utc::now()),
            error: None,
            progress: ProgressSnapshot::default(),
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: JobSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.id, snapshot.id);
        assert_eq!(back.kind, JobKind::Extraction);
        assert_eq!(back.status, JobStatus::Completed);
    }
}
