//! Store error types.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying `SQLx` failure.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A persisted value could not be decoded into its domain type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The store contents contradict what the caller asserts about them,
    /// e.g. an attempt to overwrite a terminal result with a different one.
    #[error("inconsistent store state: {0}")]
    InconsistentState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = StoreError::InconsistentState("conflicting result for row 3".to_string());
        assert!(e.to_string().contains("row 3"));
    }
}
