//! Local key-value cache.
//!
//! Synchronous get/set/remove, the shape of browser local storage. The
//! credential token and session user are kept here, outside the realtime
//! transport's own session store.

use std::collections::HashMap;
use std::sync::RwLock;

use rusqlite::{params, OptionalExtension};

use crm_core::error::{CrmError, CrmResult};

use crate::db::Database;

/// String key-value store local to this process or device.
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> CrmResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CrmResult<()>;
    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> CrmResult<bool>;
}

/// Process-local cache.
#[derive(Default)]
pub struct MemoryKeyValueCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> CrmError {
        CrmError::Internal("key-value cache lock poisoned".into())
    }
}

impl KeyValueCache for MemoryKeyValueCache {
    fn get(&self, key: &str) -> CrmResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CrmResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CrmResult<bool> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        Ok(entries.remove(key).is_some())
    }
}

/// Cache persisted in the `kv_cache` table, surviving restarts.
#[derive(Clone)]
pub struct SqliteKeyValueCache {
    db: Database,
}

impl SqliteKeyValueCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl KeyValueCache for SqliteKeyValueCache {
    fn get(&self, key: &str) -> CrmResult<Option<String>> {
        let conn = self.db.conn()?;
        conn.query_row("SELECT value FROM kv_cache WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .map_err(|e| CrmError::Database(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> CrmResult<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO kv_cache (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| CrmError::Database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CrmResult<bool> {
        let conn = self.db.conn()?;
        let changed = conn
            .execute("DELETE FROM kv_cache WHERE key = ?1", [key])
            .map_err(|e| CrmError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}
