//! Sync status store.
//!
//! Per-entity `SyncStatusRecord`s shared between the bridge (writer) and any
//! number of views (readers). Writes are last-write-wins: a manual refresh
//! and an incoming change event racing on the same entity are not ordered.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crm_models::WatchedEntity;

use crate::event_bus::{AppEvent, EventBus};
use crate::notification::{Notifier, Toast};

/// Sync state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// A subscription or fetch is in flight.
    Loading,
    /// The live channel delivered at least one change.
    Connected,
    /// A manual fetch completed.
    Synced,
    /// The last subscription or fetch failed.
    Error,
    /// No session; nothing is being watched.
    Disconnected,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Connected => write!(f, "connected"),
            Self::Synced => write!(f, "synced"),
            Self::Error => write!(f, "error"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRecord {
    pub status: SyncStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for SyncStatusRecord {
    fn default() -> Self {
        Self {
            status: SyncStatus::Disconnected,
            last_update: None,
            last_error: None,
        }
    }
}

/// Ordered copy of every record, as published to watchers.
pub type StatusSnapshot = BTreeMap<WatchedEntity, SyncStatusRecord>;

/// Shared per-entity status map.
pub struct SyncStatusStore {
    records: Arc<RwLock<HashMap<WatchedEntity, SyncStatusRecord>>>,
    snapshot_tx: watch::Sender<StatusSnapshot>,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
}

impl SyncStatusStore {
    /// Create a store with every watched entity `disconnected`.
    pub fn new(notifier: Arc<dyn Notifier>, event_bus: EventBus) -> Self {
        let records: HashMap<_, _> = WatchedEntity::ALL
            .into_iter()
            .map(|entity| (entity, SyncStatusRecord::default()))
            .collect();
        let (snapshot_tx, _) = watch::channel(Self::collect(&records));

        Self {
            records: Arc::new(RwLock::new(records)),
            snapshot_tx,
            notifier,
            event_bus,
        }
    }

    pub async fn get(&self, entity: WatchedEntity) -> SyncStatusRecord {
        self.records
            .read()
            .await
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn status(&self, entity: WatchedEntity) -> SyncStatus {
        self.get(entity).await.status
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.records
            .read()
            .await
            .iter()
            .map(|(entity, record)| (*entity, record.clone()))
            .collect()
    }

    /// Receive a fresh snapshot after every write.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Set a non-error status. Use `set_error` to record failures.
    pub async fn set_status(&self, entity: WatchedEntity, status: SyncStatus) {
        self.write(entity, status, None).await;
    }

    /// Move `entity` into `error`, keeping the message, and raise a toast.
    pub async fn set_error(&self, entity: WatchedEntity, message: impl Into<String>) {
        self.write(entity, SyncStatus::Error, Some(message.into())).await;
    }

    /// Stamp `last_update` with the current time.
    pub async fn mark_updated(&self, entity: WatchedEntity) {
        let snapshot = {
            let mut records = self.records.write().await;
            records.entry(entity).or_default().last_update = Some(Utc::now());
            Self::collect(&records)
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Reset every entity to `status`.
    pub async fn set_all(&self, status: SyncStatus) {
        for entity in WatchedEntity::ALL {
            self.set_status(entity, status).await;
        }
    }

    async fn write(&self, entity: WatchedEntity, status: SyncStatus, error: Option<String>) {
        let (previous, snapshot) = {
            let mut records = self.records.write().await;
            let record = records.entry(entity).or_default();
            let previous = record.status;
            record.status = status;
            match status {
                SyncStatus::Error => record.last_error = error.clone(),
                SyncStatus::Connected | SyncStatus::Synced | SyncStatus::Disconnected => {
                    record.last_error = None
                }
                SyncStatus::Loading => {}
            }
            (previous, Self::collect(&records))
        };
        self.snapshot_tx.send_replace(snapshot);

        if previous != status {
            info!("{entity} status: {previous} -> {status}");
        } else {
            debug!("{entity} status: {status}");
        }

        if status == SyncStatus::Error {
            let body = match error {
                Some(ref message) => format!("{entity}: {message}"),
                None => format!("{entity} could not be synchronized"),
            };
            self.notifier.notify(Toast::error("Sync error", body));
        }

        self.event_bus.emit(AppEvent::SyncStatusChanged {
            entity,
            status,
            error,
        });
    }

    fn collect(records: &HashMap<WatchedEntity, SyncStatusRecord>) -> StatusSnapshot {
        records
            .iter()
            .map(|(entity, record)| (*entity, record.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::notification::ToastLevel;

    #[derive(Default)]
    struct CollectingNotifier(Mutex<Vec<Toast>>);

    impl Notifier for CollectingNotifier {
        fn notify(&self, toast: Toast) {
            self.0.lock().unwrap().push(toast);
        }
    }

    fn store() -> (SyncStatusStore, Arc<CollectingNotifier>, EventBus) {
        let notifier = Arc::new(CollectingNotifier::default());
        let bus = EventBus::new(32);
        let store = SyncStatusStore::new(notifier.clone(), bus.clone());
        (store, notifier, bus)
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let (store, _, _) = store();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.values().all(|r| r.status == SyncStatus::Disconnected && r.last_update.is_none()));
    }

    #[tokio::test]
    async fn test_error_toasts_and_publishes() {
        let (store, notifier, bus) = store();
        let mut rx = bus.subscribe();

        store.set_error(WatchedEntity::Clients, "boom").await;

        let record = store.get(WatchedEntity::Clients).await;
        assert_eq!(record.status, SyncStatus::Error);
        assert_eq!(record.last_error.as_deref(), Some("boom"));
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            AppEvent::SyncStatusChanged { status: SyncStatus::Error, .. }
        ));

        store.set_status(WatchedEntity::Clients, SyncStatus::Synced).await;
        assert!(store.get(WatchedEntity::Clients).await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_every_error_write_toasts() {
        let (store, notifier, _) = store();
        store.set_error(WatchedEntity::Proposals, "boom").await;
        store.set_error(WatchedEntity::Proposals, "still down").await;
        store.set_status(WatchedEntity::Organizations, SyncStatus::Error).await;

        let toasts = notifier.0.lock().unwrap();
        let bodies: Vec<_> = toasts.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(
            bodies,
            vec![
                "proposals: boom",
                "proposals: still down",
                "organizations could not be synchronized",
            ]
        );
        assert!(toasts.iter().all(|t| t.level == ToastLevel::Error));
    }

    #[tokio::test]
    async fn test_watchers_see_writes() {
        let (store, _, _) = store();
        let mut rx = store.subscribe();

        store.set_status(WatchedEntity::Organizations, SyncStatus::Loading).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow()[&WatchedEntity::Organizations].status, SyncStatus::Loading);

        let before = Utc::now();
        store.mark_updated(WatchedEntity::Organizations).await;
        rx.changed().await.unwrap();
        let last_update = rx.borrow()[&WatchedEntity::Organizations].last_update;
        assert!(last_update.is_some_and(|t| t >= before));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (store, _, _) = store();
        store.set_status(WatchedEntity::Clients, SyncStatus::Synced).await;
        store.set_status(WatchedEntity::Clients, SyncStatus::Connected).await;
        assert_eq!(store.status(WatchedEntity::Clients).await, SyncStatus::Connected);
    }
}
