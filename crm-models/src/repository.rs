//! Generic storage interface shared by every persistence adapter.
//!
//! The realtime layer only ever calls `list`; the CRUD surface exists for
//! the rest of the application and for the CLI.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crm_core::error::CrmResult;

use crate::entity::EntityKind;
use crate::models::TypedEntity;
use crate::record::{ChangeEvent, Record, RecordData};

/// Uniform CRUD contract over every entity kind.
///
/// Missing rows are reported as `None` / `false`; errors are reserved for
/// backend or validation failures.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Short adapter name for logs and status output.
    fn backend_name(&self) -> &'static str;

    /// All records of a kind, oldest first.
    async fn list(&self, kind: EntityKind) -> CrmResult<Vec<Record>>;

    async fn get(&self, kind: EntityKind, id: &str) -> CrmResult<Option<Record>>;

    /// Insert a new record with a generated id.
    async fn create(&self, kind: EntityKind, data: RecordData) -> CrmResult<Record>;

    /// Shallow-merge `patch` into an existing record.
    async fn update(&self, kind: EntityKind, id: &str, patch: RecordData)
        -> CrmResult<Option<Record>>;

    /// Remove a record; returns whether it existed.
    async fn delete(&self, kind: EntityKind, id: &str) -> CrmResult<bool>;
}

/// Typed helpers over any repository.
#[async_trait]
pub trait RepositoryExt: Repository {
    async fn list_as<T: TypedEntity>(&self) -> CrmResult<Vec<T>> {
        self.list(T::KIND)
            .await?
            .iter()
            .map(Record::to_typed)
            .collect()
    }

    async fn get_as<T: TypedEntity>(&self, id: &str) -> CrmResult<Option<T>> {
        match self.get(T::KIND, id).await? {
            Some(record) => Ok(Some(record.to_typed()?)),
            None => Ok(None),
        }
    }

    async fn create_as<T: TypedEntity>(&self, value: &T) -> CrmResult<T> {
        let data = Record::data_from_typed(value)?;
        self.create(T::KIND, data).await?.to_typed()
    }
}

impl<R: Repository + ?Sized> RepositoryExt for R {}

/// Receiver of change events produced by local writes.
pub trait ChangeSink: Send + Sync {
    fn publish(&self, event: ChangeEvent);
}

/// Repository wrapper that reports successful writes of watched kinds to a
/// `ChangeSink`, so a local backend can drive a change feed.
pub struct ObservedRepository {
    inner: Arc<dyn Repository>,
    sink: Arc<dyn ChangeSink>,
}

impl ObservedRepository {
    pub fn new(inner: Arc<dyn Repository>, sink: Arc<dyn ChangeSink>) -> Self {
        Self { inner, sink }
    }

    fn emit(&self, event: ChangeEvent) {
        debug!(
            "publishing {} on {} ({:?})",
            event.kind,
            event.entity,
            event.record_id()
        );
        self.sink.publish(event);
    }
}

#[async_trait]
impl Repository for ObservedRepository {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn list(&self, kind: EntityKind) -> CrmResult<Vec<Record>> {
        self.inner.list(kind).await
    }

    async fn get(&self, kind: EntityKind, id: &str) -> CrmResult<Option<Record>> {
        self.inner.get(kind, id).await
    }

    async fn create(&self, kind: EntityKind, data: RecordData) -> CrmResult<Record> {
        let record = self.inner.create(kind, data).await?;
        if let Some(entity) = kind.watched() {
            self.emit(ChangeEvent::insert(entity, record.clone()));
        }
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: RecordData,
    ) -> CrmResult<Option<Record>> {
        let Some(entity) = kind.watched() else {
            return self.inner.update(kind, id, patch).await;
        };

        let old = self.inner.get(kind, id).await?;
        let updated = self.inner.update(kind, id, patch).await?;
        if let Some(ref record) = updated {
            self.emit(ChangeEvent::update(entity, old, record.clone()));
        }
        Ok(updated)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> CrmResult<bool> {
        let Some(entity) = kind.watched() else {
            return self.inner.delete(kind, id).await;
        };

        let old = self.inner.get(kind, id).await?;
        let removed = self.inner.delete(kind, id).await?;
        if let (true, Some(old)) = (removed, old) {
            self.emit(ChangeEvent::delete(entity, old));
        }
        Ok(removed)
    }
}
