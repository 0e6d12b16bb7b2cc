//! Database schema definitions and table creation.
//!
//! Every entity kind shares one `records` table keyed by `(kind, id)` with
//! the payload stored as JSON text. The local key-value cache lives in
//! `kv_cache`.

use rusqlite::Connection;
use crm_core::error::{CrmError, CrmResult};
use tracing::debug;

/// Create all database tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> CrmResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| CrmError::Database(format!("failed to create schema: {e}")))?;
    debug!("database schema verified");
    Ok(())
}

/// Drop all tables (used for database reset).
pub fn drop_tables(conn: &Connection) -> CrmResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS records;
         DROP TABLE IF EXISTS kv_cache;
         DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| CrmError::Database(format!("failed to drop tables: {e}")))?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    kind        TEXT NOT NULL,
    id          TEXT NOT NULL,
    data        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (kind, id)
);

CREATE INDEX IF NOT EXISTS idx_records_kind_created ON records(kind, created_at);

CREATE TABLE IF NOT EXISTS kv_cache (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL
);
"#;
