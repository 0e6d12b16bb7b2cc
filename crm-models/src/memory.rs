//! In-memory repository adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crm_core::error::CrmResult;

use crate::entity::EntityKind;
use crate::record::{Record, RecordData};
use crate::repository::Repository;

/// Volatile repository keeping each kind as an insertion-ordered vector.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<HashMap<EntityKind, Vec<Record>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a kind with existing records (ids are kept).
    pub fn with_records(kind: EntityKind, records: Vec<Record>) -> Self {
        let mut tables = HashMap::new();
        tables.insert(kind, records);
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Number of stored records of a kind.
    pub async fn count(&self, kind: EntityKind) -> usize {
        self.tables.read().await.get(&kind).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, kind: EntityKind) -> CrmResult<Vec<Record>> {
        Ok(self.tables.read().await.get(&kind).cloned().unwrap_or_default())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> CrmResult<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned())
    }

    async fn create(&self, kind: EntityKind, data: RecordData) -> CrmResult<Record> {
        let record = Record::new(data);
        self.tables
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(record.clone());
        debug!("memory: created {kind}/{}", record.id);
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: RecordData,
    ) -> CrmResult<Option<Record>> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
        else {
            return Ok(None);
        };
        record.apply_patch(patch);
        Ok(Some(record.clone()))
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> CrmResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&kind) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }
}
