//! SQLite connection pool for the record store.
//!
//! Opening a database prepares the schema and applies pending migrations,
//! so every handle handed out is ready for the repository adapter.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crm_core::config::StorageConfig;
use crm_core::error::{CrmError, CrmResult};

use crate::migrations;
use crate::schema;

/// Pool of SQLite connections sharing one database file.
pub type DbPool = Pool<SqliteConnectionManager>;

type PooledConn = PooledConnection<SqliteConnectionManager>;

fn db_err(e: rusqlite::Error) -> CrmError {
    CrmError::Database(e.to_string())
}

/// Cloneable handle to the record store.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open (or create) the database file at `db_path`.
    ///
    /// Fails if the file does not pass `PRAGMA integrity_check`.
    pub fn init(db_path: &Path, config: &StorageConfig) -> CrmResult<Self> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        info!(
            "opening record store at {} (pool {}, wal {})",
            db_path.display(),
            config.pool_size,
            config.wal_mode
        );

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_customizer(Box::new(Pragmas {
                wal: config.wal_mode,
            }))
            .build(SqliteConnectionManager::file(db_path))
            .map_err(|e| CrmError::Pool(e.to_string()))?;
        let db = Self {
            pool: Arc::new(pool),
        };

        db.run_integrity_check()?;
        db.prepare_schema()?;
        Ok(db)
    }

    fn prepare_schema(&self) -> CrmResult<()> {
        let conn = self.conn()?;
        schema::create_tables(&conn)?;
        migrations::run_migrations(&conn)
    }

    /// Borrow a pooled connection.
    pub fn conn(&self) -> CrmResult<PooledConn> {
        self.pool.get().map_err(|e| CrmError::Pool(e.to_string()))
    }

    pub fn run_integrity_check(&self) -> CrmResult<()> {
        let verdict: String = self
            .conn()?
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(db_err)?;
        if verdict == "ok" {
            return Ok(());
        }
        error!("record store failed integrity check: {verdict}");
        Err(CrmError::Database(format!("integrity check failed: {verdict}")))
    }

    /// Run `f` inside a transaction; an error from `f` rolls back.
    pub fn transaction<T, F>(&self, f: F) -> CrmResult<T>
    where
        F: FnOnce(&Connection) -> CrmResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let value = f(&tx)?;
        tx.commit().map_err(db_err)?;
        Ok(value)
    }

    /// Row counts per entity kind, for kinds that have rows.
    pub fn stats(&self) -> CrmResult<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT kind, COUNT(*) FROM records GROUP BY kind ORDER BY kind")
            .map_err(db_err)?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(db_err)?
            .collect::<Result<Vec<(String, i64)>, _>>()
            .map_err(db_err)?;
        Ok(counts)
    }

    /// Drop every record and cached value, then rebuild the schema.
    pub fn reset(&self) -> CrmResult<()> {
        warn!("wiping record store");
        {
            let conn = self.conn()?;
            schema::drop_tables(&conn)?;
        }
        self.prepare_schema()
    }
}

/// Per-connection settings applied when the pool hands a connection out.
#[derive(Debug)]
struct Pragmas {
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
    }
}
