//! Store connection management.
//!
//! The store is opened with a single pooled connection and `synchronous =
//! FULL`, so every committed write has reached disk before the call returns.
//! That single-connection discipline is what makes the row checkpoint
//! trustworthy after a crash: a result row is either durably written or not
//! written at all.

use crate::error::Result;
use crate::migrations;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Incremental result store backed by a single `SQLite` file.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct TabularStore {
    pool: Pool<Sqlite>,
}

impl TabularStore {
    /// Open (or create) a dataset file and apply pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        tracing::info!(path = %path.as_ref().display(), "Store opened");
        Ok(Self { pool })
    }

    /// Open an in-memory store for tests.
    ///
    /// The pool is pinned to one connection that never expires; dropping the
    /// last connection would discard the in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Direct access to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_applies_migrations() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        let version = migrations::get_schema_version(store.pool())
            .await
            .expect("schema version");
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_open_creates_file_and_reopens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset.db");

        let store = TabularStore::open(&path).await.expect("open store");
        store.close().await;
        assert!(path.exists());

        // Reopen; migrations are already applied and must not fail
        let store = TabularStore::open(&path).await.expect("reopen store");
        let version = migrations::get_schema_version(store.pool())
            .await
            .expect("schema version");
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_expected_tables_exist() {
        let store = TabularStore::open_in_memory().await.expect("open store");
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(store.pool())
        .await
        .expect("query tables");
        assert_eq!(tables, vec!["gstin_details", "pan_results"]);
    }
}
