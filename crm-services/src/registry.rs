//! Service registry: the process-wide context of the sync layer.
//!
//! Owns the shared infrastructure (config, event bus, repository, transport,
//! cache), builds every service from it, initializes them in dependency
//! order and shuts them down in reverse. Nothing in the workspace keeps a
//! global; consumers receive what they need from here.

use std::sync::Arc;

use tracing::{error, info};

use crm_core::config::{AppConfig, ConfigHandle, StorageBackend};
use crm_core::error::{CrmError, CrmResult};
use crm_models::{
    Database, KeyValueCache, MemoryKeyValueCache, MemoryRepository, ObservedRepository,
    Repository, SqliteKeyValueCache, SqliteRepository, WatchedEntity,
};
use crm_realtime::{transport_from_config, LocalTransport, SharedTransport, SubscriptionRegistry};

use crate::bridge::{BridgeDeps, RealtimeBridge};
use crate::event_bus::EventBus;
use crate::lifecycle::SessionLifecycle;
use crate::notification::NotificationService;
use crate::service::{Service, ServiceState};
use crate::status::SyncStatusStore;
use crate::token::TokenSync;

/// Storage and transport selected by configuration.
pub struct Backends {
    /// Repository, wrapped so local writes feed the transport when present.
    pub repository: Arc<dyn Repository>,
    pub transport: Option<Arc<LocalTransport>>,
    pub cache: Arc<dyn KeyValueCache>,
    /// Open database when the SQLite backend is selected.
    pub database: Option<Database>,
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> CrmResult<Self> {
        let transport = transport_from_config(&config.realtime);

        let (base, cache, database) = match config.storage.backend {
            StorageBackend::Memory => {
                let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
                let cache: Arc<dyn KeyValueCache> = Arc::new(MemoryKeyValueCache::new());
                (repository, cache, None)
            }
            StorageBackend::Sqlite => {
                let db = Database::init(&config.effective_db_path()?, &config.storage)?;
                let repository: Arc<dyn Repository> = Arc::new(SqliteRepository::new(db.clone()));
                let cache: Arc<dyn KeyValueCache> = Arc::new(SqliteKeyValueCache::new(db.clone()));
                (repository, cache, Some(db))
            }
        };

        let repository: Arc<dyn Repository> = match transport {
            Some(ref transport) => Arc::new(ObservedRepository::new(base, transport.clone())),
            None => base,
        };

        info!(
            "backends: storage={}, realtime={}",
            repository.backend_name(),
            if transport.is_some() { "local" } else { "disabled" }
        );

        Ok(Self {
            repository,
            transport,
            cache,
            database,
        })
    }

    pub fn shared_transport(&self) -> Option<SharedTransport> {
        self.transport.clone().map(|t| t as SharedTransport)
    }
}

/// Central registry that wires and manages every service.
pub struct ServiceRegistry {
    pub config: ConfigHandle,
    pub event_bus: EventBus,
    pub repository: Arc<dyn Repository>,
    pub transport: Option<SharedTransport>,
    pub cache: Arc<dyn KeyValueCache>,
    pub notifier: Arc<NotificationService>,
    pub status: Arc<SyncStatusStore>,
    pub token_sync: Arc<TokenSync>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub bridge: Arc<RealtimeBridge>,
    pub lifecycle: Arc<SessionLifecycle>,
    /// Registered services in initialization order.
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Build the full service graph.
    ///
    /// Initialization order:
    /// 1. Notification (event bus)
    /// 2. TokenSync (transport, cache)
    /// 3. RealtimeBridge (registry, repository, token, status, notifier)
    /// 4. SessionLifecycle (bridge, token)
    pub async fn new(
        config: ConfigHandle,
        repository: Arc<dyn Repository>,
        transport: Option<SharedTransport>,
        cache: Arc<dyn KeyValueCache>,
    ) -> CrmResult<Self> {
        let (notifications, entity_names) = {
            let cfg = config.read().await;
            (cfg.notifications.clone(), cfg.realtime.entities.clone())
        };
        let entities = WatchedEntity::parse_list(entity_names.as_slice())
            .map_err(|e| CrmError::Config(format!("realtime.entities: {e}")))?;

        let event_bus = EventBus::default();
        let notifier = Arc::new(NotificationService::new(event_bus.clone(), &notifications));
        let status = Arc::new(SyncStatusStore::new(notifier.clone(), event_bus.clone()));
        let token_sync = Arc::new(TokenSync::new(transport.clone(), cache.clone()));
        let subscriptions = Arc::new(SubscriptionRegistry::new(transport.clone()));
        let bridge = Arc::new(RealtimeBridge::new(
            BridgeDeps {
                subscriptions: subscriptions.clone(),
                repository: repository.clone(),
                token_sync: token_sync.clone(),
                status: status.clone(),
                notifier: notifier.clone(),
                event_bus: event_bus.clone(),
            },
            entities,
            notifications.toast_on_refresh_all,
        ));
        let lifecycle = Arc::new(SessionLifecycle::new(
            bridge.clone(),
            token_sync.clone(),
            event_bus.clone(),
        ));

        let mut registry = Self {
            config,
            event_bus,
            repository,
            transport,
            cache,
            notifier: notifier.clone(),
            status,
            token_sync: token_sync.clone(),
            subscriptions,
            bridge: bridge.clone(),
            lifecycle: lifecycle.clone(),
            services: Vec::new(),
        };
        registry.register(notifier);
        registry.register(token_sync);
        registry.register(bridge);
        registry.register(lifecycle);
        Ok(registry)
    }

    /// Build the service graph over configured backends.
    pub async fn from_backends(config: ConfigHandle, backends: &Backends) -> CrmResult<Self> {
        Self::new(
            config,
            backends.repository.clone(),
            backends.shared_transport(),
            backends.cache.clone(),
        )
        .await
    }

    /// Register a service. Services are initialized in registration order.
    pub fn register(&mut self, service: Arc<dyn Service>) {
        info!("registered service: {}", service.name());
        self.services.push(service);
    }

    /// Initialize all registered services in order.
    pub async fn init_all(&self) -> CrmResult<()> {
        info!("initializing {} services", self.services.len());

        for service in &self.services {
            let name = service.name();
            info!("initializing service: {name}");
            if let Err(e) = service.init().await {
                error!("failed to initialize service {name}: {e}");
                return Err(CrmError::ServiceInit(format!("{name}: {e}")));
            }
        }

        info!("all services initialized");
        Ok(())
    }

    /// Shut down all services in reverse order.
    pub async fn shutdown_all(&self) -> CrmResult<()> {
        info!("shutting down services");

        for service in self.services.iter().rev() {
            let name = service.name();
            info!("shutting down service: {name}");
            if let Err(e) = service.shutdown().await {
                // Continue shutting down other services
                error!("error shutting down service {name}: {e}");
            }
        }

        info!("all services shut down");
        Ok(())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Name, state and health of every service.
    pub fn health_check(&self) -> Vec<(String, ServiceState, bool)> {
        self.services
            .iter()
            .map(|s| (s.name().to_string(), s.state(), s.is_healthy()))
            .collect()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}
