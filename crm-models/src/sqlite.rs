//! SQLite repository adapter backed by the shared `records` table.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crm_core::error::{CrmError, CrmResult};

use crate::db::Database;
use crate::entity::EntityKind;
use crate::record::{Record, RecordData};
use crate::repository::Repository;

/// Relational adapter: one row per record, payload as JSON text.
#[derive(Clone)]
pub struct SqliteRepository {
    db: Database,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn find(conn: &Connection, kind: EntityKind, id: &str) -> CrmResult<Option<Record>> {
        conn.query_row(
            "SELECT id, data, created_at, updated_at FROM records WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
            raw_row,
        )
        .optional()
        .map_err(db_err)?
        .map(RawRow::into_record)
        .transpose()
    }

    fn write(conn: &Connection, kind: EntityKind, record: &Record) -> CrmResult<()> {
        let data = serde_json::to_string(&record.data)?;
        conn.execute(
            "INSERT INTO records (kind, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(kind, id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                kind.as_str(),
                record.id,
                data,
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

struct RawRow {
    id: String,
    data: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> CrmResult<Record> {
        let data: RecordData = serde_json::from_str(&self.data)?;
        Ok(Record {
            id: self.id,
            data,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        data: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Fixed-width so that `ORDER BY created_at` sorts chronologically.
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> CrmResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CrmError::Database(format!("bad timestamp {value:?}: {e}")))
}

fn db_err(e: rusqlite::Error) -> CrmError {
    CrmError::Database(e.to_string())
}

#[async_trait]
impl Repository for SqliteRepository {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self, kind: EntityKind) -> CrmResult<Vec<Record>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, data, created_at, updated_at FROM records
                 WHERE kind = ?1 ORDER BY created_at, rowid",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([kind.as_str()], raw_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    async fn get(&self, kind: EntityKind, id: &str) -> CrmResult<Option<Record>> {
        let conn = self.db.conn()?;
        Self::find(&conn, kind, id)
    }

    async fn create(&self, kind: EntityKind, data: RecordData) -> CrmResult<Record> {
        let record = Record::new(data);
        let conn = self.db.conn()?;
        Self::write(&conn, kind, &record)?;
        debug!("sqlite: created {kind}/{}", record.id);
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: RecordData,
    ) -> CrmResult<Option<Record>> {
        self.db.transaction(|conn| {
            let Some(mut record) = Self::find(conn, kind, id)? else {
                return Ok(None);
            };
            record.apply_patch(patch);
            Self::write(conn, kind, &record)?;
            Ok(Some(record))
        })
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> CrmResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn
            .execute(
                "DELETE FROM records WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}
