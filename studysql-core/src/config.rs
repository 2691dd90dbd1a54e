//! Connection settings
//!
//! Settings are read from the process environment at connect time. Every
//! loader takes a lookup function so tests can supply values without
//! mutating the real environment.
//!
//! Environment variables:
//!   SQLITE_DB_PATH      # SQLite database file (relative to the app root)
//!   POSTGRES_USER       # PostgreSQL credentials, all required
//!   POSTGRES_PASSWORD
//!   POSTGRES_HOST
//!   POSTGRES_PORT
//!   POSTGRES_DB_NAME

use std::path::{Path, PathBuf};

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tracing::warn;

use crate::error::{DbError, DbResult};

pub const ENV_SQLITE_DB_PATH: &str = "SQLITE_DB_PATH";
pub const ENV_POSTGRES_USER: &str = "POSTGRES_USER";
pub const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const ENV_POSTGRES_HOST: &str = "POSTGRES_HOST";
pub const ENV_POSTGRES_PORT: &str = "POSTGRES_PORT";
pub const ENV_POSTGRES_DB_NAME: &str = "POSTGRES_DB_NAME";

/// Pool bounds for the server engine
pub const POSTGRES_MIN_CONNECTIONS: u32 = 1;
pub const POSTGRES_MAX_CONNECTIONS: u32 = 20;

/// Where the schema for a freshly created SQLite file comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitScript {
    /// Built-in `documents` schema
    #[default]
    Embedded,
    /// Script read from disk; a missing file is an error
    File(PathBuf),
    /// Leave the new file without any schema
    Empty,
}

/// Settings for the embedded engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSettings {
    /// Absolute path of the database file
    pub path: PathBuf,
    /// Applied once, only when `path` does not exist yet
    pub init_script: InitScript,
}

impl SqliteSettings {
    pub fn new(path: impl Into<PathBuf>, init_script: InitScript) -> Self {
        Self {
            path: path.into(),
            init_script,
        }
    }

    /// Load from `SQLITE_DB_PATH`, anchoring relative paths at `app_root`.
    pub fn from_lookup<F>(app_root: &Path, lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = required(&lookup, ENV_SQLITE_DB_PATH)?;
        let path = resolve_db_path(app_root, &raw);
        if escapes_app_root(app_root, &path) {
            warn!(
                path = %path.display(),
                app_root = %app_root.display(),
                "{} is absolute and outside the application root; drop the leading '/' to keep the database under the root",
                ENV_SQLITE_DB_PATH
            );
        }
        Ok(Self::new(path, InitScript::Embedded))
    }

    pub fn from_env(app_root: &Path) -> DbResult<Self> {
        Self::from_lookup(app_root, |key| std::env::var(key).ok())
    }
}

/// Resolve a configured database path against the application root.
///
/// Relative paths (including ones written with a leading `./`) are joined
/// onto `app_root`; absolute paths are kept.
pub fn resolve_db_path(app_root: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw.trim());
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        app_root.join(candidate)
    }
}

/// True when a resolved path is absolute and does not sit under `app_root`.
/// Values such as `/db/sqlite/app.db` often mean "under the root".
pub fn escapes_app_root(app_root: &Path, resolved: &Path) -> bool {
    resolved.is_absolute() && !resolved.starts_with(app_root)
}

/// Settings for the server engine
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl PostgresSettings {
    /// Load all five `POSTGRES_*` values. Any missing one fails before a
    /// connection is attempted.
    pub fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = required(&lookup, ENV_POSTGRES_USER)?;
        let password = required(&lookup, ENV_POSTGRES_PASSWORD)?;
        let host = required(&lookup, ENV_POSTGRES_HOST)?;
        let port_raw = required(&lookup, ENV_POSTGRES_PORT)?;
        let database = required(&lookup, ENV_POSTGRES_DB_NAME)?;

        let port = port_raw.trim().parse::<u16>().map_err(|_| {
            DbError::invalid_config(format!(
                "{} must be a port number, got '{}'",
                ENV_POSTGRES_PORT, port_raw
            ))
        })?;

        Ok(Self {
            user,
            password,
            host,
            port,
            database,
        })
    }

    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Connection string with the password masked, for logs and status text
    pub fn redacted_dsn(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}?sslmode=disable",
            self.user, self.host, self.port, self.database
        )
    }

    /// Driver options with TLS disabled
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable)
    }
}

fn required<F>(lookup: &F, key: &'static str) -> DbResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DbError::MissingEnv(key)),
    }
}
