//! Embedded schema scripts
//!
//! Compiled into the binary via `include_str!` so the schema ships with the
//! code that queries it.

/// Applied to a freshly created SQLite file
pub const SQLITE_SCHEMA: &str = include_str!("../schema/sqlite.sql");

/// Reference schema for the PostgreSQL server (not applied automatically)
pub const POSTGRES_SCHEMA: &str = include_str!("../schema/postgres.sql");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_define_documents() {
        for schema in [SQLITE_SCHEMA, POSTGRES_SCHEMA] {
            assert!(schema.contains("CREATE TABLE IF NOT EXISTS documents"));
            assert!(schema.contains("document_id"));
            assert!(schema.contains("updated_at"));
        }
    }
}
