//! In-memory job table with JSON history persistence.

use crate::error::{JobError, Result};
use crate::job::{JobKind, JobParameters, JobSnapshot, JobStatus};
use crate::progress::Progress;
use chrono::{DateTime, Utc};
use gstmap_core::JobId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

/// Message recorded when a job is cancelled.
pub const CANCELLED_MESSAGE: &str = "job cancelled";
/// Message recorded for jobs that were active when the process last exited.
const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

pub(crate) struct JobEntry {
    pub kind: JobKind,
    pub dataset: PathBuf,
    pub params: JobParameters,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub progress: Arc<Progress>,
    pub cancel: CancellationToken,
}

impl JobEntry {
    fn snapshot(&self, id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: id.clone(),
            kind: self.kind,
            dataset: self.dataset.clone(),
            params: self.params.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
            progress: self.progress.snapshot(),
        }
    }
}

/// Tracks every submitted job for the lifetime of the process.
#[derive(Default)]
pub struct JobRegistry {
    inner: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, JobEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, JobEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new queued job.
    ///
    /// Refused when another active job targets the same dataset; two workers
    /// writing the same file would corrupt the row checkpoint.
    pub fn insert(
        &self,
        kind: JobKind,
        dataset: PathBuf,
        params: JobParameters,
        progress: Arc<Progress>,
        cancel: CancellationToken,
    ) -> Result<JobId> {
        let mut jobs = self.write();
        if let Some((id, _)) = jobs
            .iter()
            .find(|(_, entry)| entry.status.is_active() && entry.dataset == dataset)
        {
            return Err(JobError::DuplicateInput(format!(
                "dataset {} is already claimed by job {id}",
                dataset.display()
            )));
        }

        let id = JobId::generate();
        jobs.insert(
            id.clone(),
            JobEntry {
                kind,
                dataset,
                params,
                status: JobStatus::Queued,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                error: None,
                progress,
                cancel,
            },
        );
        Ok(id)
    }

    /// Snapshot one job.
    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot> {
        self.read()
            .get(id)
            .map(|entry| entry.snapshot(id))
            .ok_or_else(|| JobError::UnknownJob(id.clone()))
    }

    /// Snapshot every job, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .read()
            .iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    /// Transition a queued job to processing.
    pub(crate) fn mark_processing(&self, id: &JobId) {
        if let Some(entry) = self.write().get_mut(id) {
            if entry.status == JobStatus::Queued {
                entry.status = JobStatus::Processing;
                entry.started_at = Some(Utc::now());
            }
        }
    }

    /// Transition an active job to completed.
    pub(crate) fn mark_completed(&self, id: &JobId) {
        if let Some(entry) = self.write().get_mut(id) {
            if entry.status.is_active() {
                entry.status = JobStatus::Completed;
                entry.finished_at = Some(Utc::now());
            }
        }
    }

    /// Transition an active job to failed with a message.
    pub(crate) fn mark_failed(&self, id: &JobId, message: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            if entry.status.is_active() {
                entry.status = JobStatus::Failed;
                entry.finished_at = Some(Utc::now());
                entry.error = Some(message.to_string());
            }
        }
    }

    /// Request cancellation of an active job.
    ///
    /// The worker observes the token between records, finishes the record in
    /// flight, and marks the job failed with [`CANCELLED_MESSAGE`].
    pub fn cancel(&self, id: &JobId) -> Result<()> {
        let jobs = self.read();
        let entry = jobs.get(id).ok_or_else(|| JobError::UnknownJob(id.clone()))?;
        if entry.status.is_terminal() {
            return Err(JobError::InvalidState(format!(
                "job {id} already finished"
            )));
        }
        entry.cancel.cancel();
        Ok(())
    }

    /// Remove a terminal job from the registry.
    pub fn clear(&self, id: &JobId) -> Result<JobSnapshot> {
        let mut jobs = self.write();
        let entry = jobs.get(id).ok_or_else(|| JobError::UnknownJob(id.clone()))?;
        if entry.status.is_active() {
            return Err(JobError::InvalidState(format!(
                "job {id} is still {:?}",
                entry.status
            )));
        }
        let snapshot = entry.snapshot(id);
        jobs.remove(id);
        Ok(snapshot)
    }

    /// Write every job snapshot to a JSON history file.
    pub fn save_history(&self, path: &Path) -> Result<()> {
        let snapshots = self.list();
        let json = serde_json::to_string_pretty(&snapshots)
            .map_err(|e| JobError::History(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| JobError::History(e.to_string()))?;
        tracing::debug!(path = %path.display(), jobs = snapshots.len(), "Job history saved");
        Ok(())
    }

    /// Load a JSON history file written by [`save_history`](Self::save_history).
    ///
    /// Jobs that were active when the history was written cannot be resumed
    /// as registry entries; they are loaded as failed so their datasets can
    /// be picked up again with a resume submission.
    pub fn load_history(&self, path: &Path) -> Result<usize> {
        let json = std::fs::read_to_string(path).map_err(|e| JobError::History(e.to_string()))?;
        let snapshots: Vec<JobSnapshot> =
            serde_json::from_str(&json).map_err(|e| JobError::History(e.to_string()))?;

        let count = snapshots.len();
        let mut jobs = self.write();
        for snapshot in snapshots {
            let (status, error) = if snapshot.status.is_active() {
                (JobStatus::Failed, Some(INTERRUPTED_MESSAGE.to_string()))
            } else {
                (snapshot.status, snapshot.error)
            };
            jobs.insert(
                snapshot.id,
                JobEntry {
                    kind: snapshot.kind,
                    dataset: snapshot.dataset,
                    params: snapshot.params,
                    status,
                    created_at: snapshot.created_at,
                    started_at: snapshot.started_at,
                    finished_at: snapshot.finished_at.or_else(|| Some(Utc::now())),
                    error,
                    progress: Arc::new(Progress::from_snapshot(&snapshot.progress)),
                    cancel: CancellationToken::new(),
                },
            );
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(registry: &JobRegistry, dataset: &str) -> JobId {
        registry
            .insert(
                JobKind::Extraction,
                PathBuf::from(dataset),
                JobParameters::default(),
                Arc::new(Progress::default()),
                CancellationToken::new(),
            )
            .expect("insert job")
    }

    #[test]
    fn test_duplicate_active_dataset_refused() {
        let registry = JobRegistry::default();
        queued(&registry, "a.db");
        let err = registry
            .insert(
                JobKind::Enrichment,
                PathBuf::from("a.db"),
                JobParameters::default(),
                Arc::new(Progress::default()),
                CancellationToken::new(),
            )
            .expect_err("duplicate must fail");
        assert!(matches!(err, JobError::DuplicateInput(_)));
    }

    #[test]
    fn test_terminal_job_frees_its_dataset() {
        let registry = JobRegistry::default();
        let id = queued(&registry, "a.db");
        registry.mark_processing(&id);
        registry.mark_completed(&id);
        // Same dataset can be submitted again once the first job finished
        queued(&registry, "a.db");
    }

    #[test]
    fn test_clear_refuses_active_jobs() {
        let registry = JobRegistry::default();
        let id = queued(&registry, "a.db");
        let err = registry.clear(&id).expect_err("clear queued must fail");
        assert!(matches!(err, JobError::InvalidState(_)));

        registry.mark_processing(&id);
        let err = registry.clear(&id).expect_err("clear processing must fail");
        assert!(matches!(err, JobError::InvalidState(_)));

        registry.mark_failed(&id, "boom");
        registry.clear(&id).expect("clear failed job");
        assert!(matches!(
            registry.snapshot(&id),
            Err(JobError::UnknownJob(_))
        ));
    }

    #[test]
    fn test_cancel_terminal_job_refused() {
        let registry = JobRegistry::default();
        let id = queued(&registry, "a.db");
        registry.mark_processing(&id);
        registry.mark_completed(&id);
        let err = registry.cancel(&id).expect_err("cancel completed must fail");
        assert!(matches!(err, JobError::InvalidState(_)));
    }

    #[test]
    fn test_terminal_transitions_are_sticky() {
        let registry = JobRegistry::default();
        let id = queued(&registry, "a.db");
        registry.mark_processing(&id);
        registry.mark_failed(&id, "boom");
        // A late completion from a racing worker must not resurrect the job
        registry.mark_completed(&id);
        let snapshot = registry.snapshot(&id).expect("snapshot");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_history_round_trip_marks_active_as_interrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.json");

        let registry = JobRegistry::default();
        let done = queued(&registry, "a.db");
        registry.mark_processing(&done);
        registry.mark_completed(&done);
        let running = queued(&registry, "b.db");
        registry.mark_processing(&running);

        registry.save_history(&path).expect("save history");

        let restored = JobRegistry::default();
        let count = restored.load_history(&path).expect("load history");
        assert_eq!(count, 2);

        let done_snapshot = restored.snapshot(&done).expect("done snapshot");
        assert_eq!(done_snapshot.status, JobStatus::Completed);

        let running_snapshot = restored.snapshot(&running).expect("running snapshot");
        assert_eq!(running_snapshot.status, JobStatus::Failed);
        assert_eq!(
            running_snapshot.error.as_deref(),
            Some("interrupted by restart")
        );
    }
}
