//! Unified database handler
//!
//! `DatabaseHandler` is the only database entry point the UI uses. It owns
//! at most one active adapter, chosen by the `use_postgres` flag, and builds
//! adapters through a [`Connector`] so tests can substitute their own.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Backend, BackendKind, PostgresBackend, SqliteBackend};
use crate::config::{PostgresSettings, SqliteSettings};
use crate::error::{DbError, DbResult};
use crate::value::{Row, Value};

/// Builds a connected adapter for a backend kind
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, kind: BackendKind) -> DbResult<Box<dyn Backend>>;
}

/// Reads settings from the process environment at connect time
#[derive(Debug, Clone)]
pub struct EnvConnector {
    app_root: PathBuf,
}

impl EnvConnector {
    /// `app_root` anchors a relative `SQLITE_DB_PATH`
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
        }
    }
}

#[async_trait]
impl Connector for EnvConnector {
    async fn open(&self, kind: BackendKind) -> DbResult<Box<dyn Backend>> {
        match kind {
            BackendKind::Sqlite => {
                let settings = SqliteSettings::from_env(&self.app_root)?;
                Ok(Box::new(SqliteBackend::open(settings).await?))
            }
            BackendKind::Postgres => {
                let settings = PostgresSettings::from_env()?;
                Ok(Box::new(PostgresBackend::open(settings).await?))
            }
        }
    }
}

/// Fixed settings, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticConnector {
    pub sqlite: Option<SqliteSettings>,
    pub postgres: Option<PostgresSettings>,
}

impl StaticConnector {
    pub fn sqlite(settings: SqliteSettings) -> Self {
        Self {
            sqlite: Some(settings),
            postgres: None,
        }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn open(&self, kind: BackendKind) -> DbResult<Box<dyn Backend>> {
        match kind {
            BackendKind::Sqlite => {
                let settings = self
                    .sqlite
                    .clone()
                    .ok_or_else(|| DbError::invalid_config("no SQLite settings configured"))?;
                Ok(Box::new(SqliteBackend::open(settings).await?))
            }
            BackendKind::Postgres => {
                let settings = self
                    .postgres
                    .clone()
                    .ok_or_else(|| DbError::invalid_config("no PostgreSQL settings configured"))?;
                Ok(Box::new(PostgresBackend::open(settings).await?))
            }
        }
    }
}

/// Single entry point for all database access
pub struct DatabaseHandler {
    use_postgres: bool,
    backend: Option<Box<dyn Backend>>,
    connector: Box<dyn Connector>,
}

impl DatabaseHandler {
    /// Create an unconnected handler
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            use_postgres: false,
            backend: None,
            connector: Box::new(connector),
        }
    }

    /// Create a handler that reads settings from the environment
    pub fn from_env(app_root: impl Into<PathBuf>) -> Self {
        Self::new(EnvConnector::new(app_root))
    }

    /// Create a handler and connect it in one step
    pub async fn open(connector: impl Connector + 'static, use_postgres: bool) -> DbResult<Self> {
        let mut handler = Self::new(connector);
        handler.connect(use_postgres).await?;
        Ok(handler)
    }

    /// Connect to the backend selected by `use_postgres`.
    ///
    /// An adapter that is already active is closed first, so a handler never
    /// holds two.
    pub async fn connect(&mut self, use_postgres: bool) -> DbResult<()> {
        self.release().await?;

        self.use_postgres = use_postgres;
        let kind = BackendKind::from_flag(use_postgres);
        let backend = self.connector.open(kind).await?;
        info!(backend = %kind, "database handler connected");
        self.backend = Some(backend);
        Ok(())
    }

    /// Close the current adapter (if any) and connect with the new flag
    pub async fn reconnect(&mut self, use_postgres: bool) -> DbResult<()> {
        debug!(use_postgres, "reconnecting database handler");
        self.connect(use_postgres).await
    }

    /// Whether the active adapter holds an open connection
    pub fn is_connected(&self) -> DbResult<bool> {
        Ok(self.active()?.is_connected())
    }

    pub async fn execute_query(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        self.active_mut()?.execute_query(sql, params).await
    }

    pub async fn fetch_query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.active_mut()?.fetch_query(sql, params).await
    }

    pub async fn close_connection(&mut self) -> DbResult<()> {
        self.active_mut()?.close_connection().await
    }

    /// Flag used by the last connect
    pub fn use_postgres(&self) -> bool {
        self.use_postgres
    }

    /// Engine of the active adapter, if one was ever connected
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    async fn release(&mut self) -> DbResult<()> {
        if let Some(mut previous) = self.backend.take() {
            debug!(backend = %previous.kind(), "closing previous adapter");
            previous.close_connection().await?;
        }
        Ok(())
    }

    fn active(&self) -> DbResult<&dyn Backend> {
        self.backend.as_deref().ok_or(DbError::NotInitialized)
    }

    fn active_mut(&mut self) -> DbResult<&mut Box<dyn Backend>> {
        self.backend.as_mut().ok_or(DbError::NotInitialized)
    }
}
