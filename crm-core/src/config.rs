//! TOML configuration for storage, realtime, logging and notifications.
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CrmError, CrmResult};
use crate::platform::Platform;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persistence backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Realtime change-feed settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Which repository adapter backs the generic storage interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile in-process maps.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite file path; empty selects `crm.db` in the data directory.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Upper bound on pooled SQLite connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Realtime transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether a realtime client is constructed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buffered events per channel; further events are dropped until the
    /// dispatcher catches up.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Watched entity names. Empty means every watched entity.
    #[serde(default)]
    pub entities: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level or `EnvFilter` directives, e.g. "info,crm_realtime=debug".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory; empty selects `logs` in the data directory.
    #[serde(default)]
    pub directory: String,

    /// Write the log file as JSON lines.
    #[serde(default)]
    pub json_output: bool,
}

/// Toast behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Raise a toast after a successful refresh of every entity.
    #[serde(default = "default_true")]
    pub toast_on_refresh_all: bool,

    /// Also show native desktop notifications.
    #[serde(default)]
    pub desktop: bool,
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_channel_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: default_channel_capacity(),
            entities: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            toast_on_refresh_all: true,
            desktop: false,
        }
    }
}

impl AppConfig {
    /// Read `config.toml` from the platform config directory, or fall back
    /// to defaults when no file has been written yet.
    pub fn load_default() -> CrmResult<Self> {
        let path = Self::default_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    /// Parse a TOML file; missing sections and fields take their defaults.
    pub fn load_from_file(path: &Path) -> CrmResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn save_default(&self) -> CrmResult<()> {
        self.save_to_file(&Self::default_config_path()?)
    }

    /// Write as pretty TOML, creating missing parent directories.
    pub fn save_to_file(&self, path: &Path) -> CrmResult<()> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| CrmError::Config(format!("cannot render config as TOML: {e}")))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, rendered)?;
        Ok(())
    }

    pub fn default_config_path() -> CrmResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// SQLite file used when `storage.backend = "sqlite"`.
    pub fn effective_db_path(&self) -> CrmResult<PathBuf> {
        or_data_dir(&self.storage.path, "crm.db")
    }

    /// Directory receiving the rolling log files.
    pub fn effective_log_dir(&self) -> CrmResult<PathBuf> {
        or_data_dir(&self.logging.directory, "logs")
    }
}

/// `configured` when set, otherwise `name` under the platform data dir.
fn or_data_dir(configured: &str, name: &str) -> CrmResult<PathBuf> {
    if configured.is_empty() {
        Ok(Platform::data_dir()?.join(name))
    } else {
        Ok(PathBuf::from(configured))
    }
}

/// Shared, mutable view of the configuration handed to every service.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Persist the current values to the default config path.
    pub async fn save(&self) -> CrmResult<()> {
        self.inner.read().await.save_default()
    }
}
