//! Job layer error types.

use gstmap_core::JobId;
use gstmap_store::StoreError;
use thiserror::Error;

/// Result type alias for job manager operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors surfaced by the job manager API.
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id exists.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    /// The operation is not valid for the job's current status.
    #[error("invalid job state: {0}")]
    InvalidState(String),

    /// A job over the same input is already queued or running.
    #[error("duplicate input: {0}")]
    DuplicateInput(String),

    /// The submitted input was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Job history file could not be read or written.
    #[error("history i/o: {0}")]
    History(String),
}

/// Errors that end an engine run.
///
/// Per-record failures never surface here; they are written to the store as
/// row outcomes and counted as failures. Only conditions that make the whole
/// run pointless arrive as `EngineError`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The portal session is unusable for the rest of the run.
    #[error("fatal portal error: {0}")]
    Fatal(String),

    /// The job was cancelled between records.
    #[error("job cancelled")]
    Cancelled,

    /// The store refused or failed a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}
