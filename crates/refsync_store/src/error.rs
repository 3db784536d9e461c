//! Store error types.

use refsync_engine::SyncError;

/// Errors produced by the SQLite store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking store task was cancelled or panicked.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout this crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Sink(err.to_string())
    }
}
