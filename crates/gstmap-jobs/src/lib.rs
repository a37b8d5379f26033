//! Background job manager and processing engines.
//!
//! Submissions return immediately with a job id; a spawned worker claims
//! one of a fixed number of slots, opens its own store handle and portal
//! session, and processes records with bounded retries, durable per-row
//! writes, and cooperative cancellation. Callers observe jobs only through
//! status polls.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod job;
pub mod manager;
pub mod progress;
pub mod registry;
pub mod retry;

#[cfg(test)]
mod testing;

pub use enrichment::{EnrichmentInput, EnrichmentRun};
pub use error::{EngineError, JobError, Result};
pub use extraction::ExtractionRun;
pub use job::{JobKind, JobParameters, JobSnapshot, JobStatus};
pub use manager::JobManager;
pub use progress::{Progress, ProgressSnapshot};
pub use registry::JobRegistry;
pub use retry::{DelayRange, RetryPolicy};
