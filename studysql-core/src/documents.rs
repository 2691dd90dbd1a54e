//! Document repository
//!
//! Fixed SQL templates over the `documents` table. Every template uses `%s`
//! markers, so the same text runs on either engine. Timestamps are bound
//! from the application clock rather than left to column defaults, which
//! keeps insert/update ordering identical on both engines.

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseHandler;
use crate::error::{DbError, DbResult};
use crate::pagination::{Paginated, Pagination};
use crate::value::{Value, TIMESTAMP_FORMAT};

const SELECT_COLUMNS: &str =
    "SELECT document_id, title, content, created_at, updated_at FROM documents";

/// A row of the `documents` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Document {
    /// Map a row positionally: id, title, content, created_at, updated_at.
    pub fn from_row(row: &[Value]) -> DbResult<Self> {
        if row.len() < 5 {
            return Err(DbError::decode(format!(
                "expected 5 document columns, got {}",
                row.len()
            )));
        }

        let id = row[0]
            .as_i64()
            .ok_or_else(|| DbError::decode(format!("document id is not an integer: {}", row[0])))?;

        Ok(Self {
            id,
            title: cell_text(&row[1]),
            content: cell_text(&row[2]),
            created_at: row[3].as_timestamp(),
            updated_at: row[4].as_timestamp(),
        })
    }

    /// `created_at` formatted for display
    pub fn created_display(&self) -> String {
        format_timestamp(self.created_at)
    }

    /// `updated_at` formatted for display
    pub fn updated_display(&self) -> String {
        format_timestamp(self.updated_at)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Current time at the precision both engines store
fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    // PostgreSQL keeps microseconds; drop the rest so reads compare equal
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// `updated_at` for an edit: the clock, but never at or before `created_at`,
/// so a clock stepping backwards cannot reorder the two.
fn next_updated_at(now: NaiveDateTime, created_at: Option<NaiveDateTime>) -> NaiveDateTime {
    match created_at {
        Some(created) if now <= created => created + Duration::microseconds(1),
        _ => now,
    }
}

/// Document repository
pub struct DocumentRepo<'a> {
    db: &'a mut DatabaseHandler,
}

impl<'a> DocumentRepo<'a> {
    pub fn new(db: &'a mut DatabaseHandler) -> Self {
        Self { db }
    }

    /// All documents ordered by id
    pub async fn list_all(&mut self) -> DbResult<Vec<Document>> {
        let sql = format!("{} ORDER BY document_id", SELECT_COLUMNS);
        let rows = self.db.fetch_query(&sql, &[]).await?;
        rows.iter().map(|r| Document::from_row(r)).collect()
    }

    /// One page of documents plus the total count
    pub async fn list_page(&mut self, page: Pagination) -> DbResult<Paginated<Document>> {
        let total = self.count().await?;

        let sql = format!("{} ORDER BY document_id LIMIT %s OFFSET %s", SELECT_COLUMNS);
        let rows = self
            .db
            .fetch_query(
                &sql,
                &[Value::from(page.limit()), Value::Int(page.offset() as i64)],
            )
            .await?;
        let items = rows
            .iter()
            .map(|r| Document::from_row(r))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Paginated {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let rows = self
            .db
            .fetch_query("SELECT COUNT(*) FROM documents", &[])
            .await?;
        rows.first()
            .and_then(|r| r.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| DbError::decode("COUNT(*) returned no integer"))
    }

    pub async fn get(&mut self, id: i64) -> DbResult<Option<Document>> {
        let sql = format!("{} WHERE document_id = %s", SELECT_COLUMNS);
        let rows = self.db.fetch_query(&sql, &[Value::Int(id)]).await?;
        rows.first().map(|r| Document::from_row(r)).transpose()
    }

    /// Insert a document and return its assigned id.
    ///
    /// `created_at` and `updated_at` receive the same value.
    pub async fn create(&mut self, title: &str, content: &str) -> DbResult<i64> {
        if title.trim().is_empty() {
            return Err(DbError::Validation("title must not be empty".to_string()));
        }

        let ts = now();
        let rows = self
            .db
            .fetch_query(
                "INSERT INTO documents (title, content, created_at, updated_at) \
                 VALUES (%s, %s, %s, %s) RETURNING document_id",
                &[
                    Value::from(title),
                    Value::from(content),
                    Value::Timestamp(ts),
                    Value::Timestamp(ts),
                ],
            )
            .await?;

        rows.first()
            .and_then(|r| r.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| DbError::decode("INSERT did not return document_id"))
    }

    /// Update title/content and refresh `updated_at`. Returns false when no
    /// row has that id.
    pub async fn update(&mut self, id: i64, title: &str, content: &str) -> DbResult<bool> {
        let Some(current) = self.get(id).await? else {
            return Ok(false);
        };
        let updated_at = next_updated_at(now(), current.created_at);

        let affected = self
            .db
            .execute_query(
                "UPDATE documents SET title = %s, content = %s, updated_at = %s \
                 WHERE document_id = %s",
                &[
                    Value::from(title),
                    Value::from(content),
                    Value::Timestamp(updated_at),
                    Value::Int(id),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Delete by id. Returns false when no row has that id.
    pub async fn delete(&mut self, id: i64) -> DbResult<bool> {
        let affected = self
            .db
            .execute_query("DELETE FROM documents WHERE document_id = %s", &[Value::Int(id)])
            .await?;
        Ok(affected > 0)
    }
}

impl DatabaseHandler {
    /// Repository view over this handler
    pub fn documents(&mut self) -> DocumentRepo<'_> {
        DocumentRepo::new(self)
    }
}
