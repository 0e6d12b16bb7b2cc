//! Integration tests for application configuration.
//!
//! Covers defaults, TOML parsing and files, ConfigHandle sharing, how the
//! realtime section shapes the service graph, and platform directories.

mod common;

use crm_core::config::{AppConfig, ConfigHandle, StorageBackend};
use crm_core::error::CrmError;
use crm_core::platform::Platform;
use crm_models::WatchedEntity;
use crm_services::registry::{Backends, ServiceRegistry};
use tempfile::TempDir;

// ---- Default values ----

#[test]
fn default_config_has_expected_storage_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert!(config.storage.path.is_empty(), "default db path should be empty");
    assert!(config.storage.wal_mode, "WAL mode should be enabled by default");
    assert_eq!(config.storage.pool_size, 4);
}

#[test]
fn default_config_has_expected_realtime_defaults() {
    let config = AppConfig::default();
    assert!(config.realtime.enabled);
    assert_eq!(config.realtime.channel_capacity, 64);
    assert!(config.realtime.entities.is_empty(), "empty means every watched entity");
}

#[test]
fn default_config_has_expected_logging_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.directory.is_empty());
    assert!(!config.logging.json_output);
}

#[test]
fn default_config_has_expected_notification_defaults() {
    let config = AppConfig::default();
    assert!(config.notifications.toast_on_refresh_all);
    assert!(!config.notifications.desktop);
}

// ---- TOML ----

#[test]
fn config_toml_roundtrip_preserves_all_fields() {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.path = "/data/crm.db".into();
    config.storage.pool_size = 8;
    config.realtime.enabled = false;
    config.realtime.channel_capacity = 16;
    config.realtime.entities = vec!["clients".into(), "proposals".into()];
    config.logging.level = "debug".into();
    config.logging.json_output = true;
    config.notifications.desktop = true;

    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("backend = \"sqlite\""));
    let parsed: AppConfig = toml::from_str(&text).unwrap();

    assert_eq!(parsed.storage.backend, StorageBackend::Sqlite);
    assert_eq!(parsed.storage.path, "/data/crm.db");
    assert_eq!(parsed.storage.pool_size, 8);
    assert!(!parsed.realtime.enabled);
    assert_eq!(parsed.realtime.channel_capacity, 16);
    assert_eq!(parsed.realtime.entities, vec!["clients", "proposals"]);
    assert_eq!(parsed.logging.level, "debug");
    assert!(parsed.logging.json_output);
    assert!(parsed.notifications.desktop);
}

#[test]
fn config_toml_deserialization_applies_defaults_for_missing_fields() {
    let config: AppConfig = toml::from_str(
        r#"
        [notifications]
        desktop = true
        "#,
    )
    .unwrap();
    assert!(config.notifications.desktop);
    assert!(config.notifications.toast_on_refresh_all);
    assert!(config.realtime.enabled);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

#[test]
fn config_toml_empty_string_deserializes_to_defaults() {
    let config: AppConfig = toml::from_str("").unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.realtime.channel_capacity, 64);
}

#[test]
fn config_toml_unknown_backend_is_rejected() {
    let result: Result<AppConfig, _> = toml::from_str("[storage]\nbackend = \"spreadsheet\"\n");
    assert!(result.is_err());
}

// ---- Files ----

#[test]
fn config_save_and_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.realtime.entities = vec!["organizations".into()];
    config.save_to_file(&path).unwrap();

    let loaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.realtime.entities, vec!["organizations"]);
}

#[test]
fn config_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("config.toml");
    AppConfig::default().save_to_file(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn config_load_invalid_toml_returns_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.toml");
    std::fs::write(&path, "this is not valid {{ toml }}").unwrap();

    let result = AppConfig::load_from_file(&path);
    assert!(result.is_err(), "loading invalid TOML should fail");
}

// ---- ConfigHandle async access ----

#[tokio::test]
async fn config_handle_write_updates_values() {
    let handle = common::create_test_config_handle();

    {
        let mut config = handle.write().await;
        config.notifications.toast_on_refresh_all = false;
        config.storage.backend = StorageBackend::Sqlite;
    }

    let config = handle.read().await;
    assert!(!config.notifications.toast_on_refresh_all);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
}

#[tokio::test]
async fn config_handle_clone_shares_state() {
    let handle1 = ConfigHandle::new(AppConfig::default());
    let handle2 = handle1.clone();

    handle1.write().await.realtime.enabled = false;

    assert!(
        !handle2.read().await.realtime.enabled,
        "cloned ConfigHandle should share the same underlying state"
    );
}

// ---- Config drives the service graph ----

#[tokio::test]
async fn entity_list_from_file_limits_the_bridge() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[realtime]\nentities = [\"organizations\", \"clients\"]\n\n[notifications]\ntoast_on_refresh_all = false\n",
    )
    .unwrap();

    let config = AppConfig::load_from_file(&path).unwrap();
    let backends = Backends::from_config(&config).unwrap();
    let registry = ServiceRegistry::from_backends(ConfigHandle::new(config), &backends)
        .await
        .unwrap();
    assert_eq!(
        registry.bridge.entities(),
        &[WatchedEntity::Organizations, WatchedEntity::Clients]
    );
}

#[tokio::test]
async fn unwatched_entity_in_config_is_a_config_error() {
    let mut config = AppConfig::default();
    config.realtime.entities = vec!["users".into()];
    let backends = Backends::from_config(&config).unwrap();
    let result = ServiceRegistry::from_backends(ConfigHandle::new(config), &backends).await;
    assert!(matches!(result, Err(CrmError::Config(_))));
}

// ---- Effective paths ----

#[test]
fn effective_db_path_uses_custom_when_set() {
    let mut config = AppConfig::default();
    config.storage.path = "/custom/path/my.db".into();
    let path = config.effective_db_path().unwrap();
    assert_eq!(path, std::path::PathBuf::from("/custom/path/my.db"));
}

#[test]
fn effective_db_path_uses_default_when_empty() {
    let path = AppConfig::default().effective_db_path().unwrap();
    assert!(
        path.to_string_lossy().ends_with("crm.db"),
        "default db path should end with 'crm.db'"
    );
}

#[test]
fn effective_log_dir_uses_custom_when_set() {
    let mut config = AppConfig::default();
    config.logging.directory = "/custom/logs".into();
    let path = config.effective_log_dir().unwrap();
    assert_eq!(path, std::path::PathBuf::from("/custom/logs"));
}

// ---- Platform detection ----

#[test]
fn platform_dirs_use_app_dir_name() {
    let data_dir = Platform::data_dir().unwrap();
    let config_dir = Platform::config_dir().unwrap();
    assert!(data_dir.to_string_lossy().contains("SalesCrm"));
    assert!(config_dir.to_string_lossy().contains("SalesCrm"));
}
