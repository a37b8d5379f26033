//! Enrichment engine: detail fetches for discovered registrations.
//!
//! Unlike extraction there is no row checkpoint here; detail upserts are
//! idempotent merges, so an interrupted enrichment run is simply submitted
//! again and re-fetches are harmless.

use crate::error::EngineError;
use crate::progress::Progress;
use crate::retry::{DelayRange, RetryPolicy};
use gstmap_core::Gstin;
use gstmap_portal::{DetailFetcher, DetailOutcome, PortalError};
use gstmap_store::{DetailsUpsert, TabularStore};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Which registrations an enrichment run targets.
#[derive(Debug, Clone)]
pub enum EnrichmentInput {
    /// A caller-supplied list.
    Explicit(Vec<Gstin>),
    /// Every registration the extraction pass has discovered in the dataset.
    FromStore,
}

enum TargetOutcome {
    Found(gstmap_core::GstinDetails),
    NotFound,
    RetriesSpent(String),
}

/// One enrichment pass over a dataset.
pub struct EnrichmentRun<'a> {
    /// Dataset being enriched.
    pub store: &'a TabularStore,
    /// Detail fetcher owned by this run.
    pub fetcher: &'a dyn DetailFetcher,
    /// Shared counters for status polls.
    pub progress: &'a Progress,
    /// Cooperative cancellation, observed between targets.
    pub cancel: &'a CancellationToken,
    /// Per-target retry discipline.
    pub retry: RetryPolicy,
    /// Pause between consecutive targets.
    pub pause: DelayRange,
    /// Registrations to enrich.
    pub input: EnrichmentInput,
    /// Process a single target and stop.
    pub test_mode: bool,
    /// Cap on targets processed in this run.
    pub limit: Option<u64>,
}

impl EnrichmentRun<'_> {
    /// Process every planned target.
    pub async fn run(&self) -> Result<(), EngineError> {
        let mut targets = match &self.input {
            EnrichmentInput::Explicit(gstins) => {
                let mut seen = HashSet::new();
                gstins
                    .iter()
                    .filter(|g| seen.insert(g.as_str().to_string()))
                    .cloned()
                    .collect()
            }
            EnrichmentInput::FromStore => self.store.distinct_gstins().await?,
        };
        if self.test_mode {
            targets.truncate(1);
        }
        if let Some(limit) = self.limit {
            targets.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        self.progress.set_total(targets.len() as u64);
        tracing::info!(targets = targets.len(), "Enrichment run sized");

        for (position, gstin) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if position > 0 {
                tokio::time::sleep(self.pause.sample()).await;
            }

            match self.fetch_with_retries(gstin).await? {
                TargetOutcome::Found(details) => {
                    self.store
                        .upsert_gstin_details(&DetailsUpsert::from_details(gstin, &details))
                        .await?;
                    self.progress.record_success();
                }
                TargetOutcome::NotFound => {
                    tracing::warn!(gstin = %gstin, "No detail record; nothing merged");
                    self.progress.record_failure();
                }
                TargetOutcome::RetriesSpent(message) => {
                    tracing::warn!(gstin = %gstin, %message, "Detail fetch retries spent");
                    self.progress.record_failure();
                }
            }
        }
        Ok(())
    }

    async fn fetch_with_retries(&self, gstin: &Gstin) -> Result<TargetOutcome, EngineError> {
        let mut last_failure = String::new();
        for attempt in 1..=self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.fetcher.fetch(gstin).await {
                Ok(DetailOutcome::Found(details)) => return Ok(TargetOutcome::Found(details)),
                Ok(DetailOutcome::NotFound) => return Ok(TargetOutcome::NotFound),
                Err(PortalError::Fatal(message)) => return Err(EngineError::Fatal(message)),
                Err(e) => {
                    tracing::warn!(
                        gstin = %gstin,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Detail fetch attempt failed"
                    );
                    last_failure = e.to_string();
                }
            }
        }
        Ok(TargetOutcome::RetriesSpent(last_failure))
    }
}
