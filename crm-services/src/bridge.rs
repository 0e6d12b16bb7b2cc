//! Realtime bridge.
//!
//! Mirrors remote table changes into the sync status store while a session
//! is active, and serves manual refreshes from the repository.
//!
//! Per-entity state machine:
//!
//! ```text
//! disconnected -> loading -> connected | error
//! connected    -> synced        (successful manual refresh)
//! any          -> error
//! error        -> loading       (next manual refresh)
//! ```
//!
//! There is no timeout and no retry on channel open or fetch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crm_core::error::{CrmError, CrmResult};
use crm_models::{ChangeEvent, Record, Repository, WatchedEntity};
use crm_realtime::{ChangeListener, SharedTransport, SubscriptionRegistry};

use crate::event_bus::{AppEvent, EventBus};
use crate::notification::{Notifier, Toast};
use crate::service::{Service, ServiceState, StateCell};
use crate::status::{SyncStatus, SyncStatusStore};
use crate::token::TokenSync;

/// Listener installed for every watched entity while the bridge runs.
struct BridgeListener {
    status: Arc<SyncStatusStore>,
    event_bus: EventBus,
}

#[async_trait]
impl ChangeListener for BridgeListener {
    async fn on_change(&self, entity: WatchedEntity, event: &ChangeEvent) {
        self.status.mark_updated(entity).await;
        self.status.set_status(entity, SyncStatus::Connected).await;
        self.event_bus.emit(AppEvent::EntityChanged {
            entity,
            kind: event.kind,
            record_id: event.record_id().map(str::to_string),
        });
    }

    async fn on_error(&self, entity: WatchedEntity, error: &CrmError) {
        self.status.set_error(entity, error.to_string()).await;
    }
}

/// Collaborators of a `RealtimeBridge`.
pub struct BridgeDeps {
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub repository: Arc<dyn Repository>,
    pub token_sync: Arc<TokenSync>,
    pub status: Arc<SyncStatusStore>,
    pub notifier: Arc<dyn Notifier>,
    pub event_bus: EventBus,
}

/// Pub/sub bridge between the transport, the repository and the status store.
pub struct RealtimeBridge {
    state: StateCell,
    subscriptions: Arc<SubscriptionRegistry>,
    repository: Arc<dyn Repository>,
    token_sync: Arc<TokenSync>,
    status: Arc<SyncStatusStore>,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
    /// Entities subscribed by `start`.
    entities: Vec<WatchedEntity>,
    /// Raise a success toast after `refresh_all`.
    toast_on_refresh_all: bool,
}

impl RealtimeBridge {
    pub fn new(deps: BridgeDeps, entities: Vec<WatchedEntity>, toast_on_refresh_all: bool) -> Self {
        Self {
            state: StateCell::new(),
            subscriptions: deps.subscriptions,
            repository: deps.repository,
            token_sync: deps.token_sync,
            status: deps.status,
            notifier: deps.notifier,
            event_bus: deps.event_bus,
            entities,
            toast_on_refresh_all,
        }
    }

    pub fn entities(&self) -> &[WatchedEntity] {
        &self.entities
    }

    pub fn status_store(&self) -> &Arc<SyncStatusStore> {
        &self.status
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    fn transport(&self) -> Option<&SharedTransport> {
        self.subscriptions.transport()
    }

    fn listener(&self) -> Arc<dyn ChangeListener> {
        Arc::new(BridgeListener {
            status: self.status.clone(),
            event_bus: self.event_bus.clone(),
        })
    }

    /// Subscribe every configured entity and run one initial refresh each.
    ///
    /// Failures end up in the status store; `start` itself never fails.
    pub async fn start(&self) {
        info!("starting realtime bridge for {} entities", self.entities.len());
        self.token_sync.sync_token().await;

        for &entity in &self.entities {
            self.watch_entity(entity).await;
        }

        for &entity in &self.entities {
            if let Err(e) = self.refresh_data(entity).await {
                warn!("initial refresh of {entity} failed: {e}");
            }
        }
    }

    /// Mark `entity` loading and (re)subscribe it with the bridge listener.
    ///
    /// An unavailable transport or a refused channel leaves it in `error`.
    pub async fn watch_entity(&self, entity: WatchedEntity) {
        self.status.set_status(entity, SyncStatus::Loading).await;
        self.subscriptions.subscribe(entity, self.listener()).await;
    }

    /// Drop every subscription and mark all entities `disconnected`.
    pub async fn stop(&self) {
        self.subscriptions.unsubscribe_all().await;
        self.status.set_all(SyncStatus::Disconnected).await;
        info!("realtime bridge stopped");
    }

    async fn has_session(&self) -> bool {
        let Some(transport) = self.transport() else {
            return false;
        };
        match transport.get_session().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!("could not read session: {e}");
                false
            }
        }
    }

    /// Fetch all records of `entity` from the repository.
    ///
    /// Without an active session the entity is marked `disconnected` and an
    /// empty list is returned. Fetch errors mark the entity `error` and are
    /// returned to the caller.
    pub async fn refresh_data(&self, entity: WatchedEntity) -> CrmResult<Vec<Record>> {
        if !self.has_session().await {
            debug!("refresh of {entity} skipped: no active session");
            self.status.set_status(entity, SyncStatus::Disconnected).await;
            return Ok(Vec::new());
        }

        self.token_sync.sync_token().await;
        self.status.set_status(entity, SyncStatus::Loading).await;

        match self.repository.list(entity.kind()).await {
            Ok(records) => {
                self.status.set_status(entity, SyncStatus::Synced).await;
                self.status.mark_updated(entity).await;
                debug!("refreshed {} {entity} record(s)", records.len());
                self.event_bus.emit(AppEvent::EntityRefreshed {
                    entity,
                    count: records.len(),
                });
                Ok(records)
            }
            Err(e) => {
                // The status store raises the error toast.
                self.status.set_error(entity, e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Refresh every configured entity, in order.
    pub async fn refresh_all(&self) -> Vec<(WatchedEntity, CrmResult<Vec<Record>>)> {
        let mut results = Vec::with_capacity(self.entities.len());
        for &entity in &self.entities {
            results.push((entity, self.refresh_data(entity).await));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed == 0 && self.toast_on_refresh_all {
            let total: usize = results
                .iter()
                .filter_map(|(_, r)| r.as_ref().ok())
                .map(Vec::len)
                .sum();
            self.notifier.notify(Toast::success(
                "Data refreshed",
                format!("{total} record(s) across {} entities", results.len()),
            ));
        } else if failed > 0 {
            warn!("refresh_all: {failed} of {} entities failed", results.len());
        }
        results
    }
}

#[async_trait]
impl Service for RealtimeBridge {
    fn name(&self) -> &str {
        "realtime_bridge"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CrmResult<()> {
        if self.transport().is_none() {
            warn!("realtime bridge running without a transport");
        }
        self.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> CrmResult<()> {
        self.state.set(ServiceState::ShuttingDown);
        self.subscriptions.unsubscribe_all().await;
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crm_models::{ChangeSink, MemoryKeyValueCache, MemoryRepository, RecordData};
    use crm_realtime::{LocalTransport, SessionUser};

    use crate::notification::NotificationService;

    struct Fixture {
        transport: Arc<LocalTransport>,
        bridge: RealtimeBridge,
        bus: EventBus,
    }

    fn fixture(repository: Arc<dyn Repository>) -> Fixture {
        let bus = EventBus::new(64);
        let transport = Arc::new(LocalTransport::new(16));
        let shared: SharedTransport = transport.clone();
        let notifier = Arc::new(NotificationService::new(bus.clone(), &Default::default()));
        let status = Arc::new(SyncStatusStore::new(notifier.clone(), bus.clone()));
        let deps = BridgeDeps {
            subscriptions: Arc::new(SubscriptionRegistry::new(Some(shared.clone()))),
            repository,
            token_sync: Arc::new(TokenSync::new(
                Some(shared),
                Arc::new(MemoryKeyValueCache::new()),
            )),
            status,
            notifier,
            event_bus: bus.clone(),
        };
        Fixture {
            transport,
            bridge: RealtimeBridge::new(deps, WatchedEntity::ALL.to_vec(), true),
            bus,
        }
    }

    fn record(id: &str, value: serde_json::Value) -> Record {
        let data: RecordData = Record::data_from_value(value).unwrap();
        Record::with_id(id, data)
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_disconnected() {
        let fx = fixture(Arc::new(MemoryRepository::new()));
        let records = fx.bridge.refresh_data(WatchedEntity::Clients).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(
            fx.bridge.status_store().status(WatchedEntity::Clients).await,
            SyncStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_start_subscribes_and_syncs() {
        let repo = MemoryRepository::with_records(
            crm_models::EntityKind::Proposals,
            vec![record("1", json!({"title": "A"})), record("2", json!({"title": "B"}))],
        );
        let fx = fixture(Arc::new(repo));
        fx.transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();

        fx.bridge.start().await;

        for entity in WatchedEntity::ALL {
            assert!(fx.bridge.subscriptions().has_active_subscription(entity).await);
            let record = fx.bridge.status_store().get(entity).await;
            assert_eq!(record.status, SyncStatus::Synced);
            assert!(record.last_update.is_some());
        }

        fx.bridge.stop().await;
        for entity in WatchedEntity::ALL {
            assert!(!fx.bridge.subscriptions().has_active_subscription(entity).await);
            assert_eq!(
                fx.bridge.status_store().status(entity).await,
                SyncStatus::Disconnected
            );
        }
    }

    #[tokio::test]
    async fn test_change_event_marks_connected() {
        let fx = fixture(Arc::new(MemoryRepository::new()));
        fx.transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();
        fx.bridge.start().await;
        let mut rx = fx.bus.subscribe();

        fx.transport.publish(ChangeEvent::insert(
            WatchedEntity::Clients,
            record("c1", json!({"name": "Acme"})),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            fx.bridge.status_store().status(WatchedEntity::Clients).await,
            SyncStatus::Connected
        );
        let mut saw_change = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::EntityChanged { entity, record_id, .. } = event {
                assert_eq!(entity, WatchedEntity::Clients);
                assert_eq!(record_id.as_deref(), Some("c1"));
                saw_change = true;
            }
        }
        assert!(saw_change);
    }

    #[tokio::test]
    async fn test_refresh_all_raises_success_toast() {
        let fx = fixture(Arc::new(MemoryRepository::new()));
        fx.transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();
        let mut rx = fx.bus.subscribe();

        let results = fx.bridge.refresh_all().await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        let mut toasts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Toast(toast) = event {
                toasts.push(toast);
            }
        }
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Data refreshed");
    }
}
