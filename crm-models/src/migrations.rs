//! Versioned schema upgrades for the record store.
//!
//! `schema_version` holds a single row with the highest applied step.
//! Each step runs in its own transaction together with the version bump.

use rusqlite::Connection;
use tracing::{debug, info};

use crm_core::constants::DB_SCHEMA_VERSION;
use crm_core::error::{CrmError, CrmResult};

/// One forward-only schema change.
struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

/// Ordered by version; the last entry must equal `DB_SCHEMA_VERSION`.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "index records by kind and modification time",
    sql: "CREATE INDEX IF NOT EXISTS idx_records_kind_updated ON records(kind, updated_at);",
}];

fn migration_err(e: rusqlite::Error) -> CrmError {
    CrmError::Migration(e.to_string())
}

/// Apply every step newer than the stored version.
pub fn run_migrations(conn: &Connection) -> CrmResult<()> {
    let stored = stored_version(conn)?;
    if stored > DB_SCHEMA_VERSION {
        return Err(CrmError::Migration(format!(
            "database schema version {stored} is newer than supported version {DB_SCHEMA_VERSION}"
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > stored).collect();
    if pending.is_empty() {
        debug!("record store schema at version {stored}");
        return Ok(());
    }

    for step in pending {
        info!("schema v{}: {}", step.version, step.description);
        conn.execute_batch(&format!(
            "BEGIN;\n{}\nUPDATE schema_version SET version = {};\nCOMMIT;",
            step.sql, step.version
        ))
        .map_err(|e| {
            // Leave the connection usable for the caller.
            let _ = conn.execute_batch("ROLLBACK;");
            migration_err(e)
        })?;
    }

    info!("record store schema upgraded from v{stored} to v{DB_SCHEMA_VERSION}");
    Ok(())
}

/// Current schema version, seeding the version row on a fresh database.
fn stored_version(conn: &Connection) -> CrmResult<i32> {
    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(migration_err)?;

    match version {
        Some(v) => Ok(v),
        None => {
            conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])
                .map_err(migration_err)?;
            Ok(0)
        }
    }
}
