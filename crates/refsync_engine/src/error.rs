//! Error types for the sync engine.

use crate::entity::EntityType;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the remote catalog or the sink.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote catalog answered with a non-success status.
    #[error("remote catalog returned HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request timed out.
    #[error("operation timed out")]
    Timeout,

    /// The sink rejected a clear or insert.
    #[error("sink error: {0}")]
    Sink(String),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run for this entity type is already in progress.
    #[error("a {0} sync is already running")]
    RunInProgress(EntityType),

    /// The entity type name is not recognized.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a sink error from any displayable cause.
    pub fn sink(cause: impl std::fmt::Display) -> Self {
        Self::Sink(cause.to_string())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Http { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
