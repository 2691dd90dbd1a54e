//! PostgreSQL backend - bounded connection pool
//!
//! Uses sqlx PgPool with explicit connection limits (min 1, max 20). Each
//! call checks out one connection for the length of a transaction; dropping
//! the transaction hands the connection back to the pool on every path.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::{PgInterval, PgTimeTz};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Row as _, TypeInfo, ValueRef};
use tracing::{debug, error, info};

use super::{Backend, BackendKind};
use crate::config::{PostgresSettings, POSTGRES_MAX_CONNECTIONS, POSTGRES_MIN_CONNECTIONS};
use crate::error::{DbError, DbResult};
use crate::placeholder::{rewrite, PlaceholderStyle};
use crate::value::{Row, Value};

/// PostgreSQL-backed adapter
pub struct PostgresBackend {
    settings: PostgresSettings,
    pool: Option<PgPool>,
}

impl PostgresBackend {
    /// Create an unconnected adapter
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings,
            pool: None,
        }
    }

    /// Create and connect in one step
    pub async fn open(settings: PostgresSettings) -> DbResult<Self> {
        let mut backend = Self::new(settings);
        backend.connect().await?;
        Ok(backend)
    }

    fn pool(&self) -> DbResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or(DbError::NotConnected(BackendKind::Postgres))
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn connect(&mut self) -> DbResult<()> {
        if self.pool.is_some() {
            return Ok(());
        }

        let pool = PgPoolOptions::new()
            .min_connections(POSTGRES_MIN_CONNECTIONS)
            .max_connections(POSTGRES_MAX_CONNECTIONS)
            .connect_with(self.settings.connect_options())
            .await
            .map_err(|source| {
                error!(dsn = %self.settings.redacted_dsn(), "PostgreSQL connection failed: {}", source);
                DbError::Connect {
                    backend: BackendKind::Postgres,
                    source,
                }
            })?;

        self.pool = Some(pool);
        info!(dsn = %self.settings.redacted_dsn(), "PostgreSQL connection pool initialized");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    async fn execute_query(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = rewrite(sql, PlaceholderStyle::Numbered);
        let query = bind_params(sqlx::query(&sql), params)?;
        debug!(sql = %sql, params = params.len(), "postgres execute");

        let mut tx = self.pool()?.begin().await.map_err(DbError::Query)?;
        let result = query.execute(&mut *tx).await.map_err(|e| {
            error!("Query execution failed: {}", e);
            DbError::Query(e)
        })?;
        tx.commit().await.map_err(DbError::Query)?;

        Ok(result.rows_affected())
    }

    async fn fetch_query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let sql = rewrite(sql, PlaceholderStyle::Numbered);
        let query = bind_params(sqlx::query(&sql), params)?;
        debug!(sql = %sql, params = params.len(), "postgres fetch");

        let mut tx = self.pool()?.begin().await.map_err(DbError::Query)?;
        let rows = query.fetch_all(&mut *tx).await.map_err(|e| {
            error!("Query execution failed: {}", e);
            DbError::Query(e)
        })?;
        tx.commit().await.map_err(DbError::Query)?;

        rows.iter().map(decode_row).collect()
    }

    async fn close_connection(&mut self) -> DbResult<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!("PostgreSQL connection pool closed");
        }
        Ok(())
    }
}

// NULL is sent as a typed text NULL; PostgreSQL rejects it for non-text
// columns, so callers should write NULL literally in that case.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> DbResult<Query<'q, Postgres, PgArguments>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Json(j) => query.bind(j.clone()),
            Value::Timestamp(ts) => query.bind(*ts),
            Value::Unsupported(ty) => return Err(DbError::UnsupportedParameter(ty.clone())),
        };
    }
    Ok(query)
}

fn decode_row(row: &PgRow) -> DbResult<Row> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

/// How a column type is read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    /// The single-byte `"char"` type
    Char,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Bytes,
    Json,
    Uuid,
    BoolArray,
    IntArray,
    BigIntArray,
    FloatArray,
    NumericArray,
    TextArray,
    Unsupported,
}

impl CellKind {
    fn from_type_name(name: &str) -> Self {
        match name {
            "BOOL" => Self::Bool,
            "INT2" => Self::Int2,
            "INT4" | "OID" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => Self::Text,
            "\"CHAR\"" | "CHAR" => Self::Char,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMETZ" => Self::TimeTz,
            "INTERVAL" => Self::Interval,
            "BYTEA" => Self::Bytes,
            "JSON" | "JSONB" => Self::Json,
            "UUID" => Self::Uuid,
            "BOOL[]" => Self::BoolArray,
            "INT2[]" | "INT4[]" => Self::IntArray,
            "INT8[]" => Self::BigIntArray,
            "FLOAT4[]" | "FLOAT8[]" => Self::FloatArray,
            "NUMERIC[]" => Self::NumericArray,
            "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => Self::TextArray,
            _ => Self::Unsupported,
        }
    }
}

fn decode_cell(row: &PgRow, idx: usize) -> DbResult<Value> {
    let type_name = {
        let raw = row.try_get_raw(idx).map_err(DbError::Query)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    let value = match CellKind::from_type_name(&type_name) {
        CellKind::Bool => Value::Bool(get::<bool>(row, idx)?),
        CellKind::Int2 => Value::Int(get::<i16>(row, idx)? as i64),
        CellKind::Int4 => Value::Int(get::<i32>(row, idx)? as i64),
        CellKind::Int8 => Value::Int(get::<i64>(row, idx)?),
        CellKind::Float4 => Value::Float(get::<f32>(row, idx)? as f64),
        CellKind::Float8 => Value::Float(get::<f64>(row, idx)?),
        // Kept as text so no digits are lost
        CellKind::Numeric => Value::Text(get::<BigDecimal>(row, idx)?.to_string()),
        CellKind::Text => Value::Text(get::<String>(row, idx)?),
        CellKind::Char => Value::Text(char::from(get::<i8>(row, idx)? as u8).to_string()),
        CellKind::Timestamp => Value::Timestamp(get::<NaiveDateTime>(row, idx)?),
        CellKind::TimestampTz => Value::Timestamp(get::<DateTime<Utc>>(row, idx)?.naive_utc()),
        CellKind::Date => Value::Text(get::<NaiveDate>(row, idx)?.to_string()),
        CellKind::Time => Value::Text(get::<NaiveTime>(row, idx)?.to_string()),
        CellKind::TimeTz => {
            let t = get::<PgTimeTz<NaiveTime, FixedOffset>>(row, idx)?;
            Value::Text(format!("{}{}", t.time, t.offset))
        }
        CellKind::Interval => Value::Text(format_interval(&get::<PgInterval>(row, idx)?)),
        CellKind::Bytes => Value::Bytes(get::<Vec<u8>>(row, idx)?),
        CellKind::Json => Value::Json(get::<serde_json::Value>(row, idx)?),
        CellKind::Uuid => Value::Text(get::<uuid::Uuid>(row, idx)?.to_string()),
        CellKind::BoolArray => json_array(get::<Vec<Option<bool>>>(row, idx)?),
        CellKind::IntArray => json_array(get::<Vec<Option<i32>>>(row, idx)?),
        CellKind::BigIntArray => json_array(get::<Vec<Option<i64>>>(row, idx)?),
        CellKind::FloatArray => json_array(get::<Vec<Option<f64>>>(row, idx)?),
        CellKind::NumericArray => json_array(
            get::<Vec<Option<BigDecimal>>>(row, idx)?
                .into_iter()
                .map(|d| d.map(|d| d.to_string()))
                .collect(),
        ),
        CellKind::TextArray => json_array(get::<Vec<Option<String>>>(row, idx)?),
        CellKind::Unsupported => Value::Unsupported(type_name),
    };
    Ok(value)
}

fn json_array<T: Into<serde_json::Value>>(items: Vec<Option<T>>) -> Value {
    Value::Json(serde_json::Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(serde_json::Value::Null, Into::into))
            .collect(),
    ))
}

/// Render an interval the way `psql` prints it, e.g. `1 year 2 mons 3 days 04:05:06.5`
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();

    let years = interval.months / 12;
    let months = interval.months % 12;
    for (n, unit) in [(years, "year"), (months, "mon"), (interval.days, "day")] {
        match n {
            0 => {}
            1 | -1 => parts.push(format!("{} {}", n, unit)),
            _ => parts.push(format!("{} {}s", n, unit)),
        }
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> DbResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(idx).map_err(DbError::Query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::POSTGRES_SCHEMA;

    // Integration tests require a real database
    // Run with: POSTGRES_USER=... POSTGRES_PASSWORD=... POSTGRES_HOST=...
    //           POSTGRES_PORT=... POSTGRES_DB_NAME=... cargo test -- --ignored

    #[tokio::test]
    async fn calls_fail_before_connect() {
        let mut backend = PostgresBackend::new(PostgresSettings {
            user: "u".into(),
            password: "p".into(),
            host: "localhost".into(),
            port: 5432,
            database: "d".into(),
        });

        assert!(!backend.is_connected());
        let err = backend.fetch_query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::NotConnected(BackendKind::Postgres)));

        // Closing an adapter that never connected is a no-op
        backend.close_connection().await.unwrap();
    }

    #[test]
    fn type_names_map_to_cell_kinds() {
        let cases = [
            ("BOOL", CellKind::Bool),
            ("INT8", CellKind::Int8),
            ("NUMERIC", CellKind::Numeric),
            ("BPCHAR", CellKind::Text),
            ("\"CHAR\"", CellKind::Char),
            ("TIME", CellKind::Time),
            ("TIMETZ", CellKind::TimeTz),
            ("INTERVAL", CellKind::Interval),
            ("TIMESTAMPTZ", CellKind::TimestampTz),
            ("INT4[]", CellKind::IntArray),
            ("NUMERIC[]", CellKind::NumericArray),
            ("TEXT[]", CellKind::TextArray),
            ("TSVECTOR", CellKind::Unsupported),
        ];
        for (name, kind) in cases {
            assert_eq!(CellKind::from_type_name(name), kind, "{name}");
        }
    }

    #[test]
    fn intervals_format_like_psql() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };

        assert_eq!(format_interval(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(format_interval(&interval(0, 1, 0)), "1 day");
        assert_eq!(
            format_interval(&interval(14, 3, 14_706_500_000)),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(format_interval(&interval(0, -2, -90_000_000)), "-2 days -00:01:30");
    }

    #[test]
    fn arrays_become_json_with_nulls() {
        let value = json_array(vec![Some(1i64), None, Some(3)]);
        assert_eq!(value, Value::Json(serde_json::json!([1, null, 3])));
        assert_eq!(value.to_string(), "[1,null,3]");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_round_trip() {
        let settings = PostgresSettings::from_env().expect("POSTGRES_* required");
        let mut backend = PostgresBackend::open(settings).await.expect("pool creation failed");

        // Prepared statements take one command at a time
        for statement in POSTGRES_SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            backend.execute_query(statement, &[]).await.unwrap();
        }
        backend
            .execute_query(
                "INSERT INTO documents (title, content) VALUES (%s, %s)",
                &[Value::from("pg"), Value::from("body")],
            )
            .await
            .unwrap();

        let rows = backend
            .fetch_query(
                "SELECT title, content, created_at FROM documents WHERE title = %s",
                &[Value::from("pg")],
            )
            .await
            .unwrap();
        assert!(!rows.is_empty());
        assert_eq!(rows[0][0], Value::Text("pg".into()));
        assert!(matches!(rows[0][2], Value::Timestamp(_)));

        let rows = backend
            .fetch_query(
                "SELECT 1.50::numeric, TIME '04:05:06', INTERVAL '1 day 2 hours', 'x'::\"char\"",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(
            rows[0],
            vec![
                Value::Text("1.50".into()),
                Value::Text("04:05:06".into()),
                Value::Text("1 day 02:00:00".into()),
                Value::Text("x".into()),
            ]
        );

        backend
            .execute_query("DELETE FROM documents WHERE title = %s", &[Value::from("pg")])
            .await
            .unwrap();
        backend.close_connection().await.unwrap();
        assert!(!backend.is_connected());
    }
}
