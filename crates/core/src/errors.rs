//! Error taxonomy shared by the store, the backend client and the sync engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for adjunct operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Local persistence failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The store file could not be opened or created. Fatal to the caller.
    #[error("Failed to initialize local store: {0}")]
    Initialization(String),

    /// The serialized database worker has shut down.
    #[error("Database worker unavailable")]
    WorkerUnavailable,

    /// A statement failed to prepare or execute.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// The backend answered with a failure or could not be reached.
    #[error("Backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the failure came from the backend call itself (error response,
    /// transport failure or timeout) rather than from local processing.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Timeout(_))
    }
}
