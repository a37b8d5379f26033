//! Extraction engine: PAN lookups in strict row order.
//!
//! The engine walks the seeded rows by index, looks each PAN up through the
//! portal session, and durably records the outcome before touching the next
//! row. Combined with the store's write discipline this keeps the terminal
//! rows a prefix of the input, which is what makes the checkpoint safe to
//! resume from.

use crate::error::EngineError;
use crate::progress::Progress;
use crate::retry::{DelayRange, RetryPolicy};
use gstmap_core::{GstinSummary, Pan};
use gstmap_portal::{LookupOutcome, PortalError, PortalSession};
use gstmap_store::{DetailsUpsert, PanResult, StoreError, TabularStore};
use tokio_util::sync::CancellationToken;

enum RowOutcome {
    Found(Vec<GstinSummary>),
    NoRecords,
    RetriesSpent(String),
}

/// One extraction pass over a dataset.
pub struct ExtractionRun<'a> {
    /// Dataset being filled.
    pub store: &'a TabularStore,
    /// Portal session owned by this run.
    pub session: &'a dyn PortalSession,
    /// Shared counters for status polls.
    pub progress: &'a Progress,
    /// Cooperative cancellation, observed between rows.
    pub cancel: &'a CancellationToken,
    /// Per-row retry discipline.
    pub retry: RetryPolicy,
    /// Pause between consecutive rows.
    pub pause: DelayRange,
    /// Continue from the checkpoint instead of requiring a fresh dataset.
    pub resume: bool,
    /// Process a single row and stop.
    pub test_mode: bool,
    /// Cap on rows processed in this run.
    pub limit: Option<u64>,
}

impl ExtractionRun<'_> {
    /// Process every planned row. Returns `Ok` when each planned row has a
    /// recorded outcome, including rows recorded as errors.
    pub async fn run(&self) -> Result<(), EngineError> {
        let rows = self.store.load_results().await?;

        if !self.resume && rows.iter().any(|row| row.result.is_terminal()) {
            return Err(EngineError::Store(StoreError::InconsistentState(
                "dataset already has processed rows; submit with resume to continue it"
                    .to_string(),
            )));
        }

        let mut planned: Vec<&gstmap_store::PanRow> = rows
            .iter()
            .filter(|row| !row.result.is_terminal())
            .collect();
        if self.test_mode {
            planned.truncate(1);
        }
        if let Some(limit) = self.limit {
            planned.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        self.progress.set_total(planned.len() as u64);
        tracing::info!(planned = planned.len(), resume = self.resume, "Extraction run sized");

        for (position, row) in planned.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if position > 0 {
                tokio::time::sleep(self.pause.sample()).await;
            }

            match self.lookup_with_retries(&row.pan).await? {
                RowOutcome::Found(summaries) => {
                    self.store
                        .write_pan_result(&row.pan, &PanResult::Found(summaries.clone()))
                        .await?;
                    for summary in &summaries {
                        self.store
                            .upsert_gstin_details(&DetailsUpsert::from_summary(summary, &row.pan))
                            .await?;
                    }
                    self.progress.record_success();
                }
                RowOutcome::NoRecords => {
                    self.store
                        .write_pan_result(&row.pan, &PanResult::NoRecords)
                        .await?;
                    self.progress.record_success();
                }
                RowOutcome::RetriesSpent(message) => {
                    self.store
                        .write_pan_result(&row.pan, &PanResult::Error(message))
                        .await?;
                    self.progress.record_failure();
                }
            }
        }
        Ok(())
    }

    /// Look one PAN up, retrying transient failures with backoff.
    ///
    /// Spent retries are a row outcome, not a run error; only fatal portal
    /// errors propagate.
    async fn lookup_with_retries(&self, pan: &Pan) -> Result<RowOutcome, EngineError> {
        let mut last_failure = String::new();
        for attempt in 1..=self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.session.lookup(pan).await {
                Ok(LookupOutcome::Found(summaries)) => return Ok(RowOutcome::Found(summaries)),
                Ok(LookupOutcome::NoRecords) => return Ok(RowOutcome::NoRecords),
                Err(PortalError::Fatal(message)) => return Err(EngineError::Fatal(message)),
                Err(e) => {
                    tracing::warn!(
                        pan = %pan,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Lookup attempt failed"
                    );
                    last_failure = e.to_string();
                }
            }
        }
        Ok(RowOutcome::RetriesSpent(last_failure))
    }
}
