//! Per-registration detail records.
//!
//! Filled from two directions: the extraction pass seeds a row per GSTIN it
//! discovers (status, state, source PAN) and the enrichment pass merges in
//! the detail-page attributes. Merging uses `COALESCE` so a pass that knows
//! nothing about a column never blanks what another pass wrote.

use crate::connection::TabularStore;
use crate::error::{Result, StoreError};
use gstmap_core::{Gstin, GstinDetails, GstinSummary, Pan};

/// A partial update for one registration; `None` columns are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsUpsert {
    /// The registration being written.
    pub gstin: Gstin,
    /// PAN this registration was discovered under.
    pub pan_reference: Option<String>,
    /// Registered trade name.
    pub trade_name: Option<String>,
    /// Date of registration as the portal renders it.
    pub registration_date: Option<String>,
    /// HSN codes, comma-joined.
    pub hsn_codes: Option<String>,
    /// Registration status from the results table.
    pub status: Option<String>,
    /// State of registration.
    pub state: Option<String>,
}

impl DetailsUpsert {
    /// An update carrying what the extraction results table knows.
    #[must_use]
    pub fn from_summary(summary: &GstinSummary, pan: &Pan) -> Self {
        Self {
            gstin: summary.gstin.clone(),
            pan_reference: Some(pan.as_str().to_string()),
            trade_name: None,
            registration_date: None,
            hsn_codes: None,
            status: Some(summary.status.clone()),
            state: Some(summary.state.clone()),
        }
    }

    /// An update carrying what the detail page knows.
    #[must_use]
    pub fn from_details(gstin: &Gstin, details: &GstinDetails) -> Self {
        Self {
            gstin: gstin.clone(),
            pan_reference: None,
            trade_name: details.trade_name.clone(),
            registration_date: details.registration_date.clone(),
            hsn_codes: if details.hsn_codes.is_empty() {
                None
            } else {
                Some(details.hsn_codes.join(","))
            },
            status: None,
            state: None,
        }
    }
}

/// One persisted registration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsRow {
    /// The registration identifier.
    pub gstin: Gstin,
    /// PAN this registration was discovered under, when known.
    pub pan_reference: Option<String>,
    /// Registered trade name, when enriched.
    pub trade_name: Option<String>,
    /// Date of registration, when enriched.
    pub registration_date: Option<String>,
    /// HSN codes, when enriched.
    pub hsn_codes: Vec<String>,
    /// Registration status, when known.
    pub status: Option<String>,
    /// State of registration, when known.
    pub state: Option<String>,
    /// Last write timestamp (`datetime('now')`, UTC).
    pub updated_at: String,
}

type RawDetails = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn decode_details(raw: RawDetails) -> Result<DetailsRow> {
    let (gstin, pan_reference, trade_name, registration_date, hsn_codes, status, state, updated_at) =
        raw;
    let gstin = Gstin::parse(&gstin)
        .map_err(|e| StoreError::Decode(format!("bad gstin in details table: {e}")))?;
    let hsn_codes = hsn_codes
        .map(|joined| {
            joined
                .split(',')
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(DetailsRow {
        gstin,
        pan_reference,
        trade_name,
        registration_date,
        hsn_codes,
        status,
        state,
        updated_at,
    })
}

impl TabularStore {
    /// Insert or merge a registration record.
    pub async fn upsert_gstin_details(&self, update: &DetailsUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO gstin_details
                 (gstin, pan_reference, trade_name, registration_date, hsn_codes,
                  status, state, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
             ON CONFLICT(gstin) DO UPDATE SET
                 pan_reference = COALESCE(excluded.pan_reference, pan_reference),
                 trade_name = COALESCE(excluded.trade_name, trade_name),
                 registration_date = COALESCE(excluded.registration_date, registration_date),
                 hsn_codes = COALESCE(excluded.hsn_codes, hsn_codes),
                 status = COALESCE(excluded.status, status),
                 state = COALESCE(excluded.state, state),
                 updated_at = excluded.updated_at",
        )
        .bind(update.gstin.as_str())
        .bind(update.pan_reference.as_deref())
        .bind(update.trade_name.as_deref())
        .bind(update.registration_date.as_deref())
        .bind(update.hsn_codes.as_deref())
        .bind(update.status.as_deref())
        .bind(update.state.as_deref())
        .execute(self.pool())
        .await?;
        tracing::debug!(gstin = update.gstin.as_str(), "Registration record merged");
        Ok(())
    }

    /// All registration records, ordered by GSTIN.
    pub async fn load_gstin_details(&self) -> Result<Vec<DetailsRow>> {
        let raw: Vec<RawDetails> = sqlx::query_as(
            "SELECT gstin, pan_reference, trade_name, registration_date, hsn_codes,
                    status, state, updated_at
             FROM gstin_details ORDER BY gstin",
        )
        .fetch_all(self.pool())
        .await?;
        raw.into_iter().map(decode_details).collect()
    }

    /// Every distinct GSTIN the extraction pass has discovered, ordered.
    pub async fn distinct_gstins(&self) -> Result<Vec<Gstin>> {
        let raw: Vec<String> = sqlx::query_scalar("SELECT gstin FROM gstin_details ORDER BY gstin")
            .fetch_all(self.pool())
            .await?;
        raw.iter()
            .map(|s| {
                Gstin::parse(s)
                    .map_err(|e| StoreError::Decode(format!("bad gstin in details table: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gstin(s: &str) -> Gstin {
        Gstin::parse(s).expect("valid gstin")
    }

    fn pan(s: &str) -> Pan {
        Pan::parse(s).expect("valid pan")
    }

    #[tokio::test]
    async fn test_upsert_then_load() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        let summary = GstinSummary {
            gstin: gstin("27AAACA1234F1Z5"),
            status: "Active".to_string(),
            state: "Maharashtra".to_string(),
        };
        store
            .upsert_gstin_details(&DetailsUpsert::from_summary(&summary, &pan("AAACA1234F")))
            .await
            .expect("upsert");

        let rows = store.load_gstin_details().await.expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gstin.as_str(), "27AAACA1234F1Z5");
        assert_eq!(rows[0].pan_reference.as_deref(), Some("AAACA1234F"));
        assert_eq!(rows[0].status.as_deref(), Some("Active"));
        assert!(rows[0].trade_name.is_none());
    }

    #[tokio::test]
    async fn test_merge_keeps_columns_the_update_does_not_know() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        let id = gstin("27AAACA1234F1Z5");
        let summary = GstinSummary {
            gstin: id.clone(),
            status: "Active".to_string(),
            state: "Maharashtra".to_string(),
        };
        store
            .upsert_gstin_details(&DetailsUpsert::from_summary(&summary, &pan("AAACA1234F")))
            .await
            .expect("summary upsert");

        let details = GstinDetails {
            trade_name: Some("ACME".to_string()),
            registration_date: Some("01/07/2017".to_string()),
            hsn_codes: vec!["8471".to_string(), "8473".to_string()],
        };
        store
            .upsert_gstin_details(&DetailsUpsert::from_details(&id, &details))
            .await
            .expect("details upsert");

        let rows = store.load_gstin_details().await.expect("load");
        assert_eq!(rows.len(), 1);
        // Extraction columns survive the enrichment merge and vice versa
        assert_eq!(rows[0].status.as_deref(), Some("Active"));
        assert_eq!(rows[0].pan_reference.as_deref(), Some("AAACA1234F"));
        assert_eq!(rows[0].trade_name.as_deref(), Some("ACME"));
        assert_eq!(rows[0].registration_date.as_deref(), Some("01/07/2017"));
        assert_eq!(rows[0].hsn_codes, vec!["8471", "8473"]);
    }

    #[tokio::test]
    async fn test_distinct_gstins_ordered() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        for id in ["27AAACB5678K1Z5", "07AAACA1234F1Z6", "27AAACA1234F1Z5"] {
            let summary = GstinSummary {
                gstin: gstin(id),
                status: "Active".to_string(),
                state: "Somewhere".to_string(),
            };
            store
                .upsert_gstin_details(&DetailsUpsert::from_summary(&summary, &pan("AAACA1234F")))
                .await
                .expect("upsert");
        }

        let ids = store.distinct_gstins().await.expect("distinct");
        let ids: Vec<&str> = ids.iter().map(Gstin::as_str).collect();
        assert_eq!(
            ids,
            vec!["07AAACA1234F1Z6", "27AAACA1234F1Z5", "27AAACB5678K1Z5"]
        );
    }

    #[tokio::test]
    async fn test_empty_hsn_list_does_not_blank_existing_codes() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        let id = gstin("27AAACA1234F1Z5");
        let with_codes = GstinDetails {
            trade_name: None,
            registration_date: None,
            hsn_codes: vec!["8471".to_string()],
        };
        store
            .upsert_gstin_details(&DetailsUpsert::from_details(&id, &with_codes))
            .await
            .expect("first upsert");

        let without_codes = GstinDetails {
            trade_name: Some("ACME".to_string()),
            registration_date: None,
            hsn_codes: Vec::new(),
        };
        store
            .upsert_gstin_details(&DetailsUpsert::from_details(&id, &without_codes))
            .await
            .expect("second upsert");

        let rows = store.load_gstin_details().await.expect("load");
        assert_eq!(rows[0].hsn_codes, vec!["8471"]);
        assert_eq!(rows[0].trade_name.as_deref(), Some("ACME"));
    }
}
