//! Storage-layer errors and their mapping into the core taxonomy.

use adjunct_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database at '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to start database worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Open { .. } | StorageError::Worker(_) => {
                Error::Database(DatabaseError::Initialization(err.to_string()))
            }
            StorageError::Sqlite(source) => {
                Error::Database(DatabaseError::Query(source.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_map_to_initialization_errors() {
        let err: Error = StorageError::Open {
            path: "/nope/app.db".to_string(),
            source: rusqlite::Error::InvalidQuery,
        }
        .into();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::Initialization(msg)) if msg.contains("/nope/app.db")
        ));
    }

    #[test]
    fn statement_failures_map_to_query_errors() {
        let err: Error = StorageError::from(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, Error::Database(DatabaseError::Query(_))));
    }
}
