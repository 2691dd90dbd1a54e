//! SQLite backend - one exclusive file-backed connection
//!
//! The file and its schema are created on first use. Data-modifying
//! statements (INSERT, UPDATE, DELETE, REPLACE) run inside a transaction on
//! the shared connection: committed on success, rolled back when the
//! statement fails (the transaction is dropped uncommitted). Everything else
//! runs directly, so VACUUM, PRAGMA and a caller's own BEGIN ... COMMIT
//! work. While a caller-opened transaction is active, DML joins it instead
//! of starting a new one.

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row as _, TypeInfo, ValueRef};
use tracing::{debug, error, info, warn};

use super::{Backend, BackendKind};
use crate::config::{InitScript, SqliteSettings};
use crate::error::{DbError, DbResult};
use crate::placeholder::{rewrite, PlaceholderStyle};
use crate::schema::SQLITE_SCHEMA;
use crate::value::{Row, Value, TIMESTAMP_FORMAT};

/// Busy timeout for the working connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed adapter
pub struct SqliteBackend {
    settings: SqliteSettings,
    conn: Option<SqliteConnection>,
    /// A BEGIN issued through this adapter is still open
    in_user_transaction: bool,
}

/// How a statement interacts with transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    /// INSERT, UPDATE, DELETE, REPLACE
    Dml,
    /// BEGIN, SAVEPOINT
    Begin,
    /// COMMIT, END, ROLLBACK (but not ROLLBACK TO)
    End,
    Other,
}

impl StatementKind {
    fn of(sql: &str) -> Self {
        let mut words = sql_words(sql);
        let first = words.next().unwrap_or_default().to_ascii_uppercase();
        match first.as_str() {
            "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => Self::Dml,
            "BEGIN" | "SAVEPOINT" => Self::Begin,
            "COMMIT" | "END" => Self::End,
            "ROLLBACK" => match words.next() {
                Some(w) if w.eq_ignore_ascii_case("TO") => Self::Other,
                _ => Self::End,
            },
            _ => Self::Other,
        }
    }
}

/// Leading words of a statement, skipping whitespace and comments
fn sql_words(sql: &str) -> impl Iterator<Item = &str> {
    let mut rest = sql;
    std::iter::from_fn(move || loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else if rest.is_empty() {
            return None;
        } else {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            let (word, tail) = rest.split_at(end);
            rest = tail;
            return Some(word);
        }
    })
}

impl SqliteBackend {
    /// Create an unconnected adapter
    pub fn new(settings: SqliteSettings) -> Self {
        Self {
            settings,
            conn: None,
            in_user_transaction: false,
        }
    }

    /// Create and connect in one step
    pub async fn open(settings: SqliteSettings) -> DbResult<Self> {
        let mut backend = Self::new(settings);
        backend.connect().await?;
        Ok(backend)
    }

    /// Database file this adapter works on
    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.settings.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
    }

    /// Create parent directories and apply the initialization script to a
    /// fresh file. Only called when the file does not exist.
    async fn create_database(&self) -> DbResult<()> {
        if let Some(parent) = self.settings.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let script: Cow<'_, str> = match &self.settings.init_script {
            InitScript::Embedded => Cow::Borrowed(SQLITE_SCHEMA),
            InitScript::File(path) => {
                let sql = tokio::fs::read_to_string(path).await.map_err(|source| {
                    error!(path = %path.display(), "Failed to read initialization script: {}", source);
                    DbError::InitScript {
                        path: path.clone(),
                        source,
                    }
                })?;
                Cow::Owned(sql)
            }
            InitScript::Empty => {
                warn!(
                    path = %self.settings.path.display(),
                    "No initial schema configured, creating empty database"
                );
                return Ok(());
            }
        };

        let mut conn = SqliteConnection::connect_with(&self.connect_options())
            .await
            .map_err(|source| DbError::Connect {
                backend: BackendKind::Sqlite,
                source,
            })?;

        if let Err(e) = sqlx::Executor::execute(&mut conn, sqlx::raw_sql(script.as_ref())).await {
            error!("Failed to initialize database: {}", e);
            let _ = conn.close().await;
            // Remove the half-initialized file so the next connect retries
            let _ = tokio::fs::remove_file(&self.settings.path).await;
            return Err(DbError::Query(e));
        }

        conn.close().await.map_err(|e| DbError::Close(e.to_string()))?;
        info!(path = %self.settings.path.display(), "SQLite database created with initial schema");
        Ok(())
    }

    fn connection(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or(DbError::NotConnected(BackendKind::Sqlite))
    }

    /// Wrap DML in its own transaction unless the caller already opened one
    fn wants_transaction(&self, kind: StatementKind) -> bool {
        kind == StatementKind::Dml && !self.in_user_transaction
    }

    fn track_transaction(&mut self, kind: StatementKind) {
        match kind {
            StatementKind::Begin => self.in_user_transaction = true,
            StatementKind::End => self.in_user_transaction = false,
            StatementKind::Dml | StatementKind::Other => {}
        }
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        if !tokio::fs::try_exists(&self.settings.path).await? {
            self.create_database().await?;
        }

        let conn = SqliteConnection::connect_with(&self.connect_options())
            .await
            .map_err(|source| {
                error!("SQLite connection failed: {}", source);
                DbError::Connect {
                    backend: BackendKind::Sqlite,
                    source,
                }
            })?;

        self.conn = Some(conn);
        info!(path = %self.settings.path.display(), "SQLite connection initialized");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn execute_query(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let kind = StatementKind::of(sql);
        let wrap = self.wants_transaction(kind);
        let sql = rewrite(sql, PlaceholderStyle::Question);
        let query = bind_params(sqlx::query(&sql), params)?;
        debug!(sql = %sql, params = params.len(), transaction = wrap, "sqlite execute");

        let conn = self.connection()?;
        let result = if wrap {
            let mut tx = conn.begin().await.map_err(DbError::Query)?;
            let result = query.execute(&mut *tx).await.map_err(log_query_error)?;
            tx.commit().await.map_err(DbError::Query)?;
            result
        } else {
            query.execute(&mut *conn).await.map_err(log_query_error)?
        };

        self.track_transaction(kind);
        Ok(result.rows_affected())
    }

    async fn fetch_query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let kind = StatementKind::of(sql);
        let wrap = self.wants_transaction(kind);
        let sql = rewrite(sql, PlaceholderStyle::Question);
        let query = bind_params(sqlx::query(&sql), params)?;
        debug!(sql = %sql, params = params.len(), transaction = wrap, "sqlite fetch");

        let conn = self.connection()?;
        let rows = if wrap {
            let mut tx = conn.begin().await.map_err(DbError::Query)?;
            let rows = query.fetch_all(&mut *tx).await.map_err(log_query_error)?;
            tx.commit().await.map_err(DbError::Query)?;
            rows
        } else {
            query.fetch_all(&mut *conn).await.map_err(log_query_error)?
        };

        self.track_transaction(kind);
        rows.iter().map(decode_row).collect()
    }

    async fn close_connection(&mut self) -> DbResult<()> {
        // An open caller transaction is rolled back by the engine on close
        self.in_user_transaction = false;
        if let Some(conn) = self.conn.take() {
            conn.close().await.map_err(|e| {
                error!("Failed to close SQLite connection: {}", e);
                DbError::Close(e.to_string())
            })?;
            info!("SQLite connection closed");
        }
        Ok(())
    }
}

fn log_query_error(e: sqlx::Error) -> DbError {
    error!("Query execution failed: {}", e);
    DbError::Query(e)
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> DbResult<Query<'q, Sqlite, SqliteArguments<'q>>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Json(j) => query.bind(j.to_string()),
            // Stored as sortable text, the same shape the schema defaults produce
            Value::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::Unsupported(ty) => return Err(DbError::UnsupportedParameter(ty.clone())),
        };
    }
    Ok(query)
}

fn decode_row(row: &SqliteRow) -> DbResult<Row> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

/// Decode by the storage class of the actual value, not the declared type.
fn decode_cell(row: &SqliteRow, idx: usize) -> DbResult<Value> {
    let type_name = {
        let raw = row.try_get_raw(idx).map_err(DbError::Query)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
            Value::Int(row.try_get_unchecked::<i64, _>(idx).map_err(DbError::Query)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
            Value::Float(row.try_get_unchecked::<f64, _>(idx).map_err(DbError::Query)?)
        }
        "BLOB" => Value::Bytes(
            row.try_get_unchecked::<Vec<u8>, _>(idx)
                .map_err(DbError::Query)?,
        ),
        _ => Value::Text(
            row.try_get_unchecked::<String, _>(idx)
                .map_err(DbError::Query)?,
        ),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir, init_script: InitScript) -> SqliteSettings {
        SqliteSettings::new(dir.path().join("nested").join("app.db"), init_script)
    }

    #[tokio::test]
    async fn creates_file_and_schema() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .expect("open should succeed");

        assert!(backend.is_connected());
        assert!(backend.path().exists());

        let rows = backend
            .fetch_query("SELECT COUNT(*) FROM documents", &[])
            .await
            .expect("documents table should exist");
        assert_eq!(rows, vec![vec![Value::Int(0)]]);
    }

    #[tokio::test]
    async fn init_script_skipped_when_file_exists() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("init.sql");
        std::fs::write(&script, "CREATE TABLE marker (id INTEGER);").unwrap();

        let db_path = dir.path().join("existing.db");
        std::fs::write(&db_path, b"").unwrap();

        let mut backend = SqliteBackend::open(SqliteSettings::new(
            &db_path,
            InitScript::File(script),
        ))
        .await
        .unwrap();

        let tables = backend
            .fetch_query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = %s",
                &[Value::from("marker")],
            )
            .await
            .unwrap();
        assert!(tables.is_empty(), "script must not run on an existing file");
    }

    #[tokio::test]
    async fn missing_script_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, InitScript::File(dir.path().join("nope.sql")));

        let err = SqliteBackend::open(settings).await.err().expect("should fail");
        assert!(matches!(err, DbError::InitScript { .. }));
    }

    #[tokio::test]
    async fn empty_mode_leaves_schema_less_file() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Empty))
            .await
            .unwrap();

        let err = backend
            .fetch_query("SELECT * FROM documents", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such table"), "got: {err}");
    }

    #[tokio::test]
    async fn placeholders_match_native_markers() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .unwrap();

        backend
            .execute_query(
                "INSERT INTO documents (title, content) VALUES (%s, %s)",
                &[Value::from("a"), Value::from("b")],
            )
            .await
            .unwrap();
        backend
            .execute_query(
                "INSERT INTO documents (title, content) VALUES (?, ?)",
                &[Value::from("a"), Value::from("b")],
            )
            .await
            .unwrap();

        let via_marker = backend
            .fetch_query(
                "SELECT title, content FROM documents WHERE title = %s",
                &[Value::from("a")],
            )
            .await
            .unwrap();
        let via_native = backend
            .fetch_query(
                "SELECT title, content FROM documents WHERE title = ?",
                &[Value::from("a")],
            )
            .await
            .unwrap();

        assert_eq!(via_marker.len(), 2);
        assert_eq!(via_marker, via_native);
    }

    #[tokio::test]
    async fn failed_statement_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .unwrap();

        // Second row violates NOT NULL, so the first row must not survive
        let err = backend
            .execute_query(
                "INSERT INTO documents (title) SELECT 'kept?' UNION ALL SELECT NULL",
                &[],
            )
            .await;
        assert!(matches!(err, Err(DbError::Query(_))));

        let rows = backend
            .fetch_query("SELECT COUNT(*) FROM documents", &[])
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::Int(0));
    }

    #[test]
    fn statement_kinds() {
        assert_eq!(StatementKind::of("  insert into t values (1)"), StatementKind::Dml);
        assert_eq!(StatementKind::of("REPLACE INTO t VALUES (1)"), StatementKind::Dml);
        assert_eq!(
            StatementKind::of("-- note\n/* block */ DELETE FROM t"),
            StatementKind::Dml
        );
        assert_eq!(StatementKind::of("BEGIN IMMEDIATE"), StatementKind::Begin);
        assert_eq!(StatementKind::of("savepoint sp"), StatementKind::Begin);
        assert_eq!(StatementKind::of("COMMIT"), StatementKind::End);
        assert_eq!(StatementKind::of("end transaction"), StatementKind::End);
        assert_eq!(StatementKind::of("ROLLBACK"), StatementKind::End);
        assert_eq!(StatementKind::of("ROLLBACK TO sp"), StatementKind::Other);
        assert_eq!(StatementKind::of("VACUUM"), StatementKind::Other);
        assert_eq!(StatementKind::of("PRAGMA journal_mode=WAL"), StatementKind::Other);
        assert_eq!(StatementKind::of("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Other);
        assert_eq!(StatementKind::of(""), StatementKind::Other);
        assert_eq!(StatementKind::of("-- only a comment"), StatementKind::Other);
    }

    #[tokio::test]
    async fn vacuum_and_pragma_run_outside_a_transaction() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .unwrap();

        backend.execute_query("VACUUM", &[]).await.unwrap();
        backend
            .execute_query("PRAGMA journal_mode=WAL", &[])
            .await
            .unwrap();

        let mode = backend.fetch_query("PRAGMA journal_mode", &[]).await.unwrap();
        assert_eq!(mode, vec![vec![Value::Text("wal".into())]]);
    }

    #[tokio::test]
    async fn caller_transaction_can_roll_back_writes() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .unwrap();

        backend.execute_query("BEGIN", &[]).await.unwrap();
        backend
            .execute_query(
                "INSERT INTO documents (title, content) VALUES (%s, %s)",
                &[Value::from("draft"), Value::from("")],
            )
            .await
            .unwrap();
        backend.execute_query("ROLLBACK", &[]).await.unwrap();

        let rows = backend
            .fetch_query("SELECT COUNT(*) FROM documents", &[])
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::Int(0));

        // Back in autocommit mode, DML commits on its own again
        backend
            .execute_query(
                "INSERT INTO documents (title, content) VALUES (%s, %s)",
                &[Value::from("kept"), Value::from("")],
            )
            .await
            .unwrap();
        let rows = backend
            .fetch_query("SELECT COUNT(*) FROM documents", &[])
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::Int(1));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Embedded))
            .await
            .unwrap();

        backend.close_connection().await.unwrap();
        backend.close_connection().await.unwrap();
        assert!(!backend.is_connected());

        let err = backend.fetch_query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::NotConnected(BackendKind::Sqlite)));
    }

    #[tokio::test]
    async fn decodes_storage_classes() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(settings_in(&dir, InitScript::Empty))
            .await
            .unwrap();

        let rows = backend
            .fetch_query("SELECT 7, 1.5, 'txt', X'0102', NULL", &[])
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![vec![
                Value::Int(7),
                Value::Float(1.5),
                Value::Text("txt".into()),
                Value::Bytes(vec![1, 2]),
                Value::Null,
            ]]
        );
    }
}
