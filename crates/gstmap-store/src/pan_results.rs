//! Row-ordered lookup results with checkpoint recovery.
//!
//! Every input identifier occupies one row at a fixed `row_idx`. Workers
//! process rows in index order and persist each outcome before moving on,
//! so the terminal rows always form a prefix of the ordering and the
//! checkpoint is simply the first unprocessed index.

use crate::connection::TabularStore;
use crate::error::{Result, StoreError};
use gstmap_core::{GstinSummary, Pan};
use std::collections::HashSet;

/// Outcome recorded for one input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanResult {
    /// Seeded but not yet attempted.
    NotProcessed,
    /// The portal returned one or more registrations.
    Found(Vec<GstinSummary>),
    /// The portal reported no registrations.
    NoRecords,
    /// All retries were spent; the message describes the last failure.
    Error(String),
}

impl PanResult {
    /// Storage discriminant for this outcome.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotProcessed => "not_processed",
            Self::Found(_) => "found",
            Self::NoRecords => "no_records",
            Self::Error(_) => "error",
        }
    }

    /// Whether this outcome ends processing for the row.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotProcessed)
    }
}

/// One persisted input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanRow {
    /// Position in the seeded input ordering.
    pub row_idx: u64,
    /// The identifier this row looks up.
    pub pan: Pan,
    /// Recorded outcome.
    pub result: PanResult,
    /// Last write timestamp (`datetime('now')`, UTC).
    pub updated_at: String,
}

type RawRow = (i64, String, String, Option<String>, Option<String>, String);

fn decode_row(raw: RawRow) -> Result<PanRow> {
    let (row_idx, pan, kind, gstins, error_message, updated_at) = raw;
    let pan = Pan::parse(&pan)
        .map_err(|e| StoreError::Decode(format!("row {row_idx}: bad pan: {e}")))?;
    let result = match kind.as_str() {
        "not_processed" => PanResult::NotProcessed,
        "found" => {
            let payload = gstins
                .ok_or_else(|| StoreError::Decode(format!("row {row_idx}: missing gstins")))?;
            let summaries: Vec<GstinSummary> = serde_json::from_str(&payload)
                .map_err(|e| StoreError::Decode(format!("row {row_idx}: bad gstins: {e}")))?;
            PanResult::Found(summaries)
        }
        "no_records" => PanResult::NoRecords,
        "error" => PanResult::Error(error_message.unwrap_or_default()),
        other => {
            return Err(StoreError::Decode(format!(
                "row {row_idx}: unknown result kind '{other}'"
            )))
        }
    };
    #[allow(clippy::cast_sign_loss)]
    let row_idx = row_idx as u64;
    Ok(PanRow {
        row_idx,
        pan,
        result,
        updated_at,
    })
}

impl TabularStore {
    /// Seed the input rows for a dataset.
    ///
    /// Duplicates in the input are dropped, keeping the first occurrence.
    /// Identifiers already seeded keep their row index and recorded result;
    /// unseen ones are appended after the existing rows in input order, so
    /// re-seeding on resume is harmless.
    ///
    /// Returns the total number of seeded rows.
    pub async fn seed_pans(&self, pans: &[Pan]) -> Result<u64> {
        let mut seen = HashSet::new();
        let deduped: Vec<&Pan> = pans.iter().filter(|p| seen.insert(p.as_str())).collect();

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT pan FROM pan_results ORDER BY row_idx")
                .fetch_all(self.pool())
                .await?;
        let existing_set: HashSet<&str> = existing.iter().map(String::as_str).collect();

        let mut next = existing.len() as i64;
        let mut tx = self.pool().begin().await?;
        for pan in deduped {
            if existing_set.contains(pan.as_str()) {
                continue;
            }
            sqlx::query("INSERT INTO pan_results (row_idx, pan) VALUES (?, ?)")
                .bind(next)
                .bind(pan.as_str())
                .execute(tx.as_mut())
                .await?;
            next += 1;
        }
        tx.commit().await?;

        #[allow(clippy::cast_sign_loss)]
        let total = next as u64;
        if total > existing.len() as u64 {
            tracing::info!(appended = total - existing.len() as u64, total, "Input rows seeded");
        }
        Ok(total)
    }

    /// Record the terminal outcome for a row.
    ///
    /// Writing the same terminal result again is a no-op, so a worker
    /// re-processing the row it died on is safe. Writing a *different*
    /// terminal result over an existing one is refused.
    pub async fn write_pan_result(&self, pan: &Pan, result: &PanResult) -> Result<()> {
        if !result.is_terminal() {
            return Err(StoreError::InconsistentState(format!(
                "refusing to reset row for {pan} to not_processed"
            )));
        }

        let raw: Option<RawRow> = sqlx::query_as(
            "SELECT row_idx, pan, result, gstins, error_message, updated_at
             FROM pan_results WHERE pan = ?",
        )
        .bind(pan.as_str())
        .fetch_optional(self.pool())
        .await?;

        let Some(raw) = raw else {
            return Err(StoreError::InconsistentState(format!(
                "{pan} was never seeded into this dataset"
            )));
        };
        let current = decode_row(raw)?;

        if current.result.is_terminal() {
            if current.result == *result {
                return Ok(());
            }
            return Err(StoreError::InconsistentState(format!(
                "row {} already holds a different terminal result",
                current.row_idx
            )));
        }

        let gstins = match result {
            PanResult::Found(summaries) => Some(
                serde_json::to_string(summaries)
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
            ),
            _ => None,
        };
        let error_message = match result {
            PanResult::Error(message) => Some(message.as_str()),
            _ => None,
        };

        sqlx::query(
            "UPDATE pan_results
             SET result = ?, gstins = ?, error_message = ?, updated_at = datetime('now')
             WHERE pan = ?",
        )
        .bind(result.kind())
        .bind(gstins)
        .bind(error_message)
        .bind(pan.as_str())
        .execute(self.pool())
        .await?;

        tracing::debug!(row_idx = current.row_idx, kind = result.kind(), "Row result written");
        Ok(())
    }

    /// All rows in input order.
    pub async fn load_results(&self) -> Result<Vec<PanRow>> {
        let raw: Vec<RawRow> = sqlx::query_as(
            "SELECT row_idx, pan, result, gstins, error_message, updated_at
             FROM pan_results ORDER BY row_idx",
        )
        .fetch_all(self.pool())
        .await?;
        raw.into_iter().map(decode_row).collect()
    }

    /// Index of the first unprocessed row, or the row count when every row
    /// is terminal. Recovered on open to resume an interrupted run.
    pub async fn checkpoint(&self) -> Result<u64> {
        let idx: i64 = sqlx::query_scalar(
            "SELECT COALESCE(
                 (SELECT MIN(row_idx) FROM pan_results WHERE result = 'not_processed'),
                 (SELECT COUNT(*) FROM pan_results))",
        )
        .fetch_one(self.pool())
        .await?;
        #[allow(clippy::cast_sign_loss)]
        let idx = idx as u64;
        Ok(idx)
    }
}
