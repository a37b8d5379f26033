//! Embedded schema migrations.
//!
//! Uses `SQLx`'s built-in migration support; applied migrations are tracked
//! in the `_sqlx_migrations` table inside the dataset file itself.

use crate::error::{Result, StoreError};
use sqlx::{Pool, Sqlite};

/// Run all pending migrations.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    tracing::debug!("Store migrations applied");
    Ok(())
}

/// Number of applied migrations, 0 for a store that has never been migrated.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    if table_exists == 0 {
        return Ok(0);
    }

    let version = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}
