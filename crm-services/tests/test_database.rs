//! Integration tests for the SQLite storage backend.
//!
//! Tests the repository adapter, typed helpers, the persistent key-value
//! cache, reopening an existing database, and realtime flow over SQLite.

mod common;

use std::sync::Arc;

use serde_json::json;

use crm_core::config::{AppConfig, ConfigHandle, StorageBackend, StorageConfig};
use crm_core::constants::cache_keys;
use crm_models::{
    Client, Database, EntityKind, KeyValueCache, Proposal, ProposalStage, Repository,
    RepositoryExt, SqliteKeyValueCache, SqliteRepository, WatchedEntity,
};
use crm_realtime::SessionUser;
use crm_services::registry::{Backends, ServiceRegistry};
use crm_services::status::SyncStatus;
use crm_services::token::TokenSync;

// ---- Repository ----

#[tokio::test]
async fn sqlite_repository_crud_and_stats() {
    let (db, _dir) = common::create_test_db();
    let repo = SqliteRepository::new(db.clone());

    let a = repo
        .create(EntityKind::Clients, common::data(json!({"name": "Acme", "status": "lead"})))
        .await
        .unwrap();
    repo.create(EntityKind::Clients, common::data(json!({"name": "Globex"})))
        .await
        .unwrap();
    repo.create(EntityKind::Forms, common::data(json!({"name": "Intake", "fields": []})))
        .await
        .unwrap();

    assert_eq!(
        db.stats().unwrap(),
        vec![("clients".to_string(), 2), ("forms".to_string(), 1)]
    );

    let updated = repo
        .update(EntityKind::Clients, &a.id, common::data(json!({"status": "active"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.str_field("name"), Some("Acme"));
    assert_eq!(updated.str_field("status"), Some("active"));

    assert!(repo.delete(EntityKind::Clients, &a.id).await.unwrap());
    assert!(repo.get(EntityKind::Clients, &a.id).await.unwrap().is_none());
    assert_eq!(repo.list(EntityKind::Clients).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_typed_helpers_roundtrip_models() {
    let (db, _dir) = common::create_test_db();
    let repo = SqliteRepository::new(db);

    let client = repo.create_as(&Client::new("Jane Roe")).await.unwrap();
    let mut proposal = Proposal::new(&client.id, "Annual plan", 990_000);
    proposal.stage = ProposalStage::Negotiation;
    let proposal = repo.create_as(&proposal).await.unwrap();

    let proposals: Vec<Proposal> = repo.list_as().await.unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].client_id, client.id);
    assert_eq!(proposals[0].stage, ProposalStage::Negotiation);

    let fetched: Option<Proposal> = repo.get_as(&proposal.id).await.unwrap();
    assert_eq!(fetched, Some(proposal));
}

#[tokio::test]
async fn sqlite_rejects_non_object_payloads() {
    let err = crm_models::Record::data_from_value(json!("just a string")).unwrap_err();
    assert!(matches!(err, crm_core::error::CrmError::InvalidRecord(_)));
}

#[tokio::test]
async fn sqlite_data_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("crm.db");

    let id = {
        let db = Database::init(&path, &StorageConfig::default()).unwrap();
        let repo = SqliteRepository::new(db);
        repo.create(EntityKind::Organizations, common::data(json!({"name": "Initech"})))
            .await
            .unwrap()
            .id
    };

    let db = Database::init(&path, &StorageConfig::default()).unwrap();
    let repo = SqliteRepository::new(db);
    let org = repo.get(EntityKind::Organizations, &id).await.unwrap().unwrap();
    assert_eq!(org.str_field("name"), Some("Initech"));
}

// ---- Key-value cache ----

#[tokio::test]
async fn sqlite_cache_keeps_token_across_instances() {
    let (db, _dir) = common::create_test_db();
    let h = common::create_harness(Arc::new(crm_models::MemoryRepository::new())).await;
    let session = h
        .transport
        .sign_in(SessionUser::new("u1", "rep@example.com"))
        .unwrap();

    let sync = TokenSync::new(
        h.registry.transport.clone(),
        Arc::new(SqliteKeyValueCache::new(db.clone())),
    );
    assert!(sync.sync_token().await);

    let cache = SqliteKeyValueCache::new(db);
    assert_eq!(
        cache.get(cache_keys::AUTH_TOKEN).unwrap(),
        Some(session.access_token)
    );
    assert!(cache.get(cache_keys::AUTH_USER).unwrap().unwrap().contains("rep@example.com"));
}

// ---- Realtime over SQLite ----

#[tokio::test]
async fn sqlite_backend_drives_realtime_flow() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.path = dir.path().join("crm.db").to_string_lossy().into_owned();

    let backends = Backends::from_config(&config).unwrap();
    assert!(backends.database.is_some());
    assert_eq!(backends.repository.backend_name(), "sqlite");
    let transport = backends.transport.clone().unwrap();

    let registry = ServiceRegistry::from_backends(ConfigHandle::new(config), &backends)
        .await
        .unwrap();
    transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();
    registry.init_all().await.unwrap();

    registry
        .repository
        .create(EntityKind::Organizations, common::data(json!({"name": "Initech"})))
        .await
        .unwrap();

    assert!(
        common::wait_for_status(&registry.status, WatchedEntity::Organizations, SyncStatus::Connected)
            .await
    );
    let records = registry
        .bridge
        .refresh_data(WatchedEntity::Organizations)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    registry.shutdown_all().await.unwrap();
}
