//! Job manager: submission, worker dispatch, polling, cancellation.
//!
//! Every submission registers a queued job and spawns a worker task. The
//! worker claims one of a fixed number of slots, opens its own store handle
//! and portal session, runs the engine, and records the terminal state. The
//! submitting caller only ever holds the job id; all observation goes
//! through status polls.

use crate::enrichment::{EnrichmentInput, EnrichmentRun};
use crate::error::{EngineError, JobError, Result};
use crate::extraction::ExtractionRun;
use crate::job::{JobKind, JobParameters, JobSnapshot};
use crate::progress::Progress;
use crate::registry::{JobRegistry, CANCELLED_MESSAGE};
use crate::retry::{DelayRange, RetryPolicy};
use gstmap_core::{AppConfig, JobId, Pan};
use gstmap_portal::SessionProvider;
use gstmap_store::TabularStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Owns the job registry and dispatches workers.
pub struct JobManager {
    registry: Arc<JobRegistry>,
    provider: Arc<dyn SessionProvider>,
    semaphore: Arc<Semaphore>,
    config: AppConfig,
}

impl JobManager {
    /// Create a manager with a worker slot count taken from the config.
    #[must_use]
    pub fn new(config: AppConfig, provider: Arc<dyn SessionProvider>) -> Self {
        let slots = config.processing.max_concurrent_jobs.max(1);
        Self {
            registry: Arc::new(JobRegistry::default()),
            provider,
            semaphore: Arc::new(Semaphore::new(slots)),
            config,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.processing.max_lookup_retries,
            base_delay: Duration::from_millis(self.config.processing.retry_base_delay_ms),
        }
    }

    fn pause(&self) -> DelayRange {
        DelayRange {
            min: Duration::from_millis(self.config.processing.request_delay_min_ms),
            max: Duration::from_millis(self.config.processing.request_delay_max_ms),
        }
    }

    /// Submit an extraction job over a dataset file.
    ///
    /// A fresh dataset is seeded from `pans`; a resume submission may pass
    /// the same identifiers again (they are verified against what is
    /// seeded) or an empty slice to just continue from the checkpoint.
    pub fn submit_extraction(
        &self,
        dataset: PathBuf,
        pans: Vec<Pan>,
        params: JobParameters,
    ) -> Result<JobId> {
        if pans.is_empty() && !params.resume {
            return Err(JobError::InvalidInput(
                "no identifiers to process".to_string(),
            ));
        }

        let progress = Arc::new(Progress::default());
        let cancel = CancellationToken::new();
        let id = self.registry.insert(
            JobKind::Extraction,
            dataset.clone(),
            params.clone(),
            Arc::clone(&progress),
            cancel.clone(),
        )?;
        tracing::info!(job = %id, dataset = %dataset.display(), rows = pans.len(), "Extraction job queued");

        let registry = Arc::clone(&self.registry);
        let provider = Arc::clone(&self.provider);
        let semaphore = Arc::clone(&self.semaphore);
        let retry = self.retry_policy();
        let pause = self.pause();
        let worker_id = id.clone();
        tokio::spawn(async move {
            Self::run_worker(&registry, &semaphore, &worker_id, &cancel, async {
                let store = TabularStore::open(&dataset).await?;
                if !pans.is_empty() {
                    store.seed_pans(&pans).await?;
                }
                let session = provider
                    .open_session(params.headless)
                    .await
                    .map_err(|e| EngineError::Fatal(e.to_string()))?;
                let run = ExtractionRun {
                    store: &store,
                    session: session.as_ref(),
                    progress: &progress,
                    cancel: &cancel,
                    retry,
                    pause,
                    resume: params.resume,
                    test_mode: params.test_mode,
                    limit: params.limit,
                };
                let outcome = run.run().await;
                session.close().await;
                store.close().await;
                outcome
            })
            .await;
        });
        Ok(id)
    }

    /// Submit an enrichment job over a dataset file.
    pub fn submit_enrichment(
        &self,
        dataset: PathBuf,
        input: EnrichmentInput,
        params: JobParameters,
    ) -> Result<JobId> {
        if let EnrichmentInput::Explicit(gstins) = &input {
            if gstins.is_empty() {
                return Err(JobError::InvalidInput(
                    "no identifiers to process".to_string(),
                ));
            }
        }

        let progress = Arc::new(Progress::default());
        let cancel = CancellationToken::new();
        let id = self.registry.insert(
            JobKind::Enrichment,
            dataset.clone(),
            params.clone(),
            Arc::clone(&progress),
            cancel.clone(),
        )?;
        tracing::info!(job = %id, dataset = %dataset.display(), "Enrichment job queued");

        let registry = Arc::clone(&self.registry);
        let provider = Arc::clone(&self.provider);
        let semaphore = Arc::clone(&self.semaphore);
        let retry = self.retry_policy();
        let pause = self.pause();
        let worker_id = id.clone();
        tokio::spawn(async move {
            Self::run_worker(&registry, &semaphore, &worker_id, &cancel, async {
                let store = TabularStore::open(&dataset).await?;
                let fetcher = provider
                    .open_fetcher(params.headless)
                    .await
                    .map_err(|e| EngineError::Fatal(e.to_string()))?;
                let run = EnrichmentRun {
                    store: &store,
                    fetcher: fetcher.as_ref(),
                    progress: &progress,
                    cancel: &cancel,
                    retry,
                    pause,
                    input,
                    test_mode: params.test_mode,
                    limit: params.limit,
                };
                let outcome = run.run().await;
                fetcher.close().await;
                store.close().await;
                outcome
            })
            .await;
        });
        Ok(id)
    }

    /// Claim a worker slot, run the job body, record the terminal state.
    async fn run_worker(
        registry: &JobRegistry,
        semaphore: &Arc<Semaphore>,
        id: &JobId,
        cancel: &CancellationToken,
        body: impl std::future::Future<Output = std::result::Result<(), EngineError>>,
    ) {
        let _permit = tokio::select! {
            () = cancel.cancelled() => {
                registry.mark_failed(id, CANCELLED_MESSAGE);
                return;
            }
            permit = Arc::clone(semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    registry.mark_failed(id, "worker pool closed");
                    return;
                }
            },
        };

        registry.mark_processing(id);
        match body.await {
            Ok(()) => {
                tracing::info!(job = %id, "Job completed");
                registry.mark_completed(id);
            }
            Err(EngineError::Cancelled) => {
                tracing::info!(job = %id, "Job cancelled");
                registry.mark_failed(id, CANCELLED_MESSAGE);
            }
            Err(e) => {
                tracing::error!(job = %id, error = %e, "Job failed");
                registry.mark_failed(id, &e.to_string());
            }
        }
    }

    /// Snapshot one job.
    pub fn status(&self, id: &JobId) -> Result<JobSnapshot> {
        self.registry.snapshot(id)
    }

    /// Snapshot every job, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.registry.list()
    }

    /// Request cancellation of an active job.
    pub fn cancel(&self, id: &JobId) -> Result<()> {
        self.registry.cancel(id)
    }

    /// Remove a terminal job from the registry.
    pub fn clear(&self, id: &JobId) -> Result<JobSnapshot> {
        self.registry.clear(id)
    }

    /// Persist the job table to a JSON history file.
    pub fn save_history(&self, path: &Path) -> Result<()> {
        self.registry.save_history(path)
    }

    /// Load a previously saved job history.
    pub fn load_history(&self, path: &Path) -> Result<usize> {
        self.registry.load_history(path)
    }
}
