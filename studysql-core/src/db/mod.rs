//! Database layer - backend adapters and the unified handler
//!
//! # Design Principles
//!
//! - One trait, two engines: SQLite (single connection) and PostgreSQL (pool)
//! - Call sites write `%s` placeholders; each adapter rewrites them
//! - One transaction per call, committed on success, rolled back on error
//! - At most one adapter is active per handler; switching closes the old one

pub mod handler;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use std::fmt;

use crate::error::DbResult;
use crate::value::{Row, Value};

pub use handler::{Connector, DatabaseHandler, EnvConnector, StaticConnector};
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// Which engine an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Sqlite,
    Postgres,
}

impl BackendKind {
    /// Map the UI switch value to a backend
    pub fn from_flag(use_postgres: bool) -> Self {
        if use_postgres {
            Self::Postgres
        } else {
            Self::Sqlite
        }
    }

    pub fn is_postgres(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

/// Contract every engine adapter fulfils
#[async_trait]
pub trait Backend: Send {
    /// Engine behind this adapter
    fn kind(&self) -> BackendKind;

    /// Open the connection (or pool). Calling it again while connected is a no-op.
    async fn connect(&mut self) -> DbResult<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Run INSERT/UPDATE/DELETE/DDL, returning the affected row count
    async fn execute_query(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Run a query and return every row
    async fn fetch_query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Close the connection (or pool). Safe to call when already closed.
    async fn close_connection(&mut self) -> DbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind() {
        assert_eq!(BackendKind::from_flag(true), BackendKind::Postgres);
        assert_eq!(BackendKind::from_flag(false), BackendKind::Sqlite);
        assert_eq!(BackendKind::Postgres.to_string(), "PostgreSQL");
        assert_eq!(BackendKind::Sqlite.to_string(), "SQLite");
    }
}
