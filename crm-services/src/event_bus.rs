//! Typed event bus for intra-service communication.
//!
//! Uses a tokio broadcast channel so the bridge, status store and lifecycle
//! can publish without knowing who is listening (UI views, the CLI).

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crm_models::{ChangeKind, WatchedEntity};

use crate::notification::Toast;
use crate::status::SyncStatus;

/// Application-level events.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A watched table changed remotely; views showing it should refetch.
    EntityChanged {
        entity: WatchedEntity,
        kind: ChangeKind,
        record_id: Option<String>,
    },
    /// The sync status of an entity was written.
    SyncStatusChanged {
        entity: WatchedEntity,
        status: SyncStatus,
        error: Option<String>,
    },
    /// A manual refresh finished successfully.
    EntityRefreshed {
        entity: WatchedEntity,
        count: usize,
    },
    /// A toast was raised.
    Toast(Toast),
    /// The authenticated session started or ended.
    SessionChanged {
        signed_in: bool,
        email: Option<String>,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Slow subscribers that fall behind
/// receive a `Lagged` error and miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crm_core::constants::EVENT_BUS_CAPACITY)
    }
}

/// Short label for an event (for logging).
pub fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::EntityChanged { .. } => "EntityChanged",
        AppEvent::SyncStatusChanged { .. } => "SyncStatusChanged",
        AppEvent::EntityRefreshed { .. } => "EntityRefreshed",
        AppEvent::Toast(_) => "Toast",
        AppEvent::SessionChanged { .. } => "SessionChanged",
    }
}
