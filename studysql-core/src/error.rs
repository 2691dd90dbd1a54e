/// Structured error types for studysql-core.
///
/// The binary (studysql-cli) wraps these in `anyhow` only at the terminal
/// setup boundary; every UI action turns them into an outcome message.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::db::BackendKind;

/// Main error type for database access
#[derive(Error, Debug)]
pub enum DbError {
    /// A required environment variable is not set
    #[error("Missing required environment variable '{0}'")]
    MissingEnv(&'static str),

    /// Configuration value present but unusable
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Could not open a connection or pool
    #[error("{backend} connection failed: {source}")]
    Connect {
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    /// Initialization script could not be read
    #[error("Failed to read initialization script {path:?}: {source}")]
    InitScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Handler used before a successful connect
    #[error("Database handler is not initialized")]
    NotInitialized,

    /// Adapter used after its connection was closed
    #[error("{0} connection is not established")]
    NotConnected(BackendKind),

    /// Statement failed inside the engine
    #[error("Query execution failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Caller-supplied data rejected before reaching the engine
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A parameter value the engine cannot bind
    #[error("Cannot bind parameter of type {0}")]
    UnsupportedParameter(String),

    /// Closing the connection or pool failed
    #[error("Failed to close connection: {0}")]
    Close(String),

    /// A fetched row does not have the expected shape
    #[error("Failed to decode row: {0}")]
    Decode(String),

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Result type alias for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    /// Create a config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::MissingEnv("POSTGRES_HOST");
        assert_eq!(
            err.to_string(),
            "Missing required environment variable 'POSTGRES_HOST'"
        );

        let err = DbError::NotConnected(BackendKind::Sqlite);
        assert_eq!(err.to_string(), "SQLite connection is not established");

        let err = DbError::decode("expected 5 columns, got 2");
        assert!(err.to_string().contains("expected 5 columns"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let db_err: DbError = io_err.into();

        assert!(matches!(db_err, DbError::Io { .. }));
    }
}
