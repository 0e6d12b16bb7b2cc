//! Shared test utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crm_core::config::{AppConfig, ConfigHandle, StorageConfig};
use crm_core::error::{CrmError, CrmResult};
use crm_models::{
    Database, EntityKind, MemoryKeyValueCache, MemoryRepository, ObservedRepository, Record,
    RecordData, Repository, WatchedEntity,
};
use crm_realtime::{LocalTransport, Session, SessionUser, SharedTransport};
use crm_services::registry::ServiceRegistry;
use crm_services::status::{SyncStatus, SyncStatusStore};
use tempfile::TempDir;

/// Create a temporary database with full schema and migrations applied.
/// Returns the Database and the TempDir (must be held alive for the duration of the test).
pub fn create_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let db = Database::init(&path, &StorageConfig::default()).expect("failed to init test database");
    (db, dir)
}

/// Create a ConfigHandle wrapping a default config.
pub fn create_test_config_handle() -> ConfigHandle {
    ConfigHandle::new(AppConfig::default())
}

/// A fully wired service graph over an in-process transport.
pub struct Harness {
    pub transport: Arc<LocalTransport>,
    pub cache: Arc<MemoryKeyValueCache>,
    pub registry: ServiceRegistry,
}

impl Harness {
    pub fn status(&self) -> &Arc<SyncStatusStore> {
        &self.registry.status
    }

    pub fn sign_in(&self) -> Session {
        self.transport
            .sign_in(SessionUser::new("user-1", "rep@example.com"))
            .expect("sign in")
    }
}

/// Wire every service around `repository`, with writes observed by the
/// local transport.
pub async fn create_harness(repository: Arc<dyn Repository>) -> Harness {
    create_harness_with_config(repository, AppConfig::default()).await
}

pub async fn create_harness_with_config(
    repository: Arc<dyn Repository>,
    config: AppConfig,
) -> Harness {
    let transport = Arc::new(LocalTransport::new(config.realtime.channel_capacity));
    let cache = Arc::new(MemoryKeyValueCache::new());
    let observed: Arc<dyn Repository> =
        Arc::new(ObservedRepository::new(repository, transport.clone()));
    let registry = ServiceRegistry::new(
        ConfigHandle::new(config),
        observed,
        Some(transport.clone() as SharedTransport),
        cache.clone(),
    )
    .await
    .expect("failed to build registry");
    Harness {
        transport,
        cache,
        registry,
    }
}

/// Repository whose every call fails, counting `list` calls.
#[derive(Default)]
pub struct FailingRepository {
    pub list_calls: AtomicUsize,
}

impl FailingRepository {
    fn fail(kind: EntityKind) -> CrmError {
        CrmError::Fetch {
            entity: kind.to_string(),
            message: "backend offline".into(),
        }
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for FailingRepository {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn list(&self, kind: EntityKind) -> CrmResult<Vec<Record>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Err(Self::fail(kind))
    }

    async fn get(&self, kind: EntityKind, _id: &str) -> CrmResult<Option<Record>> {
        Err(Self::fail(kind))
    }

    async fn create(&self, kind: EntityKind, _data: RecordData) -> CrmResult<Record> {
        Err(Self::fail(kind))
    }

    async fn update(&self, kind: EntityKind, _id: &str, _patch: RecordData) -> CrmResult<Option<Record>> {
        Err(Self::fail(kind))
    }

    async fn delete(&self, kind: EntityKind, _id: &str) -> CrmResult<bool> {
        Err(Self::fail(kind))
    }
}

/// Build record data from a JSON literal.
pub fn data(value: serde_json::Value) -> RecordData {
    Record::data_from_value(value).expect("record data must be an object")
}

/// An in-memory repository pre-seeded with proposals `1` and `2`.
pub fn seeded_proposals() -> MemoryRepository {
    MemoryRepository::with_records(
        EntityKind::Proposals,
        vec![
            Record::with_id("1", data(serde_json::json!({"title": "Website redesign", "amountCents": 120000}))),
            Record::with_id("2", data(serde_json::json!({"title": "Support retainer", "amountCents": 50000}))),
        ],
    )
}

/// Poll until `entity` reaches `status`, for up to a second.
pub async fn wait_for_status(store: &SyncStatusStore, entity: WatchedEntity, status: SyncStatus) -> bool {
    for _ in 0..100 {
        if store.status(entity).await == status {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Give spawned dispatchers a chance to drain their channels.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
