//! Core library for studysql: engine adapters, the unified handler, the
//! document repository and the ad-hoc SQL console.

pub mod config;
pub mod console;
pub mod db;
pub mod documents;
pub mod error;
pub mod pagination;
pub mod placeholder;
pub mod schema;
pub mod text;
pub mod value;

pub use config::{InitScript, PostgresSettings, SqliteSettings};
pub use console::{ConsoleError, ConsoleOutcome, QueryKind, ResultTable, SAMPLE_QUERIES};
pub use db::{Backend, BackendKind, DatabaseHandler};
pub use documents::{Document, DocumentRepo};
pub use error::{DbError, DbResult};
pub use pagination::{Paginated, Pagination};
pub use value::{Row, Value};
