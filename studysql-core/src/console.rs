//! Ad-hoc SQL console
//!
//! Classification is a plain prefix check: statements starting with
//! `SELECT` or `WITH` are reads, everything else is a write. Nothing else
//! about the text is inspected.

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::DatabaseHandler;
use crate::error::DbError;
use crate::value::Row;

/// Query used to show the table after a write
pub const SNAPSHOT_QUERY: &str = "SELECT * FROM documents";

/// Canned statements offered on the query screen
pub const SAMPLE_QUERIES: &[(&str, &str)] = &[
    ("Select all", "SELECT * FROM documents"),
    (
        "Search by title",
        "SELECT * FROM documents WHERE title LIKE '%keyword%'",
    ),
    (
        "Insert",
        "INSERT INTO documents (title, content) VALUES ('New title', 'New content')",
    ),
    (
        "Update",
        "UPDATE documents SET title = 'Updated title', content = 'Updated content' WHERE document_id = 1",
    ),
    ("Delete", "DELETE FROM documents WHERE document_id = 1"),
];

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Please enter a query")]
    EmptyQuery,

    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Read,
    Write,
}

/// Classify a statement by its leading keyword
pub fn classify(text: &str) -> Result<QueryKind, ConsoleError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::EmptyQuery);
    }

    let upper = trimmed.to_ascii_uppercase();
    if upper.starts_with("SELECT") || upper.starts_with("WITH") {
        Ok(QueryKind::Read)
    } else {
        Ok(QueryKind::Write)
    }
}

/// Rows rendered as strings, with positional column labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn from_rows(rows: &[Row]) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            labels: (1..=width).map(|i| format!("Col {}", i)).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleOutcome {
    Selected(ResultTable),
    Executed {
        rows_affected: u64,
        /// `documents` after the write; `None` when the refresh failed
        snapshot: Option<ResultTable>,
    },
}

impl ConsoleOutcome {
    /// One-line summary for the status area
    pub fn summary(&self) -> String {
        match self {
            Self::Selected(table) => format!("{} rows selected", table.len()),
            Self::Executed { .. } => "Query executed".to_string(),
        }
    }

    /// Table to display, if any
    pub fn table(&self) -> Option<&ResultTable> {
        match self {
            Self::Selected(table) => Some(table),
            Self::Executed { snapshot, .. } => snapshot.as_ref(),
        }
    }
}

/// Classify and run one statement
pub async fn run(db: &mut DatabaseHandler, text: &str) -> Result<ConsoleOutcome, ConsoleError> {
    let sql = text.trim();
    match classify(sql)? {
        QueryKind::Read => {
            let rows = db.fetch_query(sql, &[]).await?;
            debug!(rows = rows.len(), "console read");
            Ok(ConsoleOutcome::Selected(ResultTable::from_rows(&rows)))
        }
        QueryKind::Write => {
            let rows_affected = db.execute_query(sql, &[]).await?;
            debug!(rows_affected, "console write");

            let snapshot = match db.fetch_query(SNAPSHOT_QUERY, &[]).await {
                Ok(rows) => Some(ResultTable::from_rows(&rows)),
                Err(e) => {
                    warn!(error = %e, "could not refresh documents after write");
                    None
                }
            };
            Ok(ConsoleOutcome::Executed {
                rows_affected,
                snapshot,
            })
        }
    }
}
