//! Errors raised by the backend client.

use adjunct_core::errors::Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Connect, TLS, timeout or body read failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body is not the expected row list.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The backend answered with a non-success status. `code` is the
    /// PostgREST / Postgres error code when the body carried one.
    #[error("Rejected ({status}){}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}

impl BackendError {
    pub fn rejected(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Everything that reached (or tried to reach) the backend is a backend
/// failure to the sync engine. Requests that were never sendable are not.
impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidRequest(message) => Error::Validation(message),
            other @ BackendError::InvalidApiKey => Error::Config(other.to_string()),
            other => Error::backend(other.status_code(), other.to_string()),
        }
    }
}
