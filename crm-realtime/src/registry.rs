//! Subscription registry: at most one live channel per watched entity.
//!
//! Each subscription owns a dispatcher task that drains its channel and
//! forwards messages to a `ChangeListener`. Teardown aborts the dispatcher
//! before the channel is closed, so a replaced subscription never delivers
//! another event.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crm_core::error::CrmError;
use crm_models::{ChangeEvent, WatchedEntity};

use crate::transport::{ChannelHandle, ChannelMessage, SharedTransport};

/// Receiver of everything a subscription produces.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    /// A change event for the subscribed entity arrived.
    async fn on_change(&self, entity: WatchedEntity, event: &ChangeEvent);

    /// The transport could not serve the subscription.
    async fn on_error(&self, entity: WatchedEntity, error: &CrmError);
}

struct ChannelSubscription {
    handle: ChannelHandle,
    dispatcher: JoinHandle<()>,
}

/// Live subscriptions plus a per-entity generation counter.
///
/// Every subscribe, unsubscribe and unsubscribe-all bumps the generation of
/// the entities it touches. A channel whose open finishes after its
/// generation moved on is closed instead of recorded.
#[derive(Default)]
struct Subscriptions {
    active: HashMap<WatchedEntity, ChannelSubscription>,
    generations: HashMap<WatchedEntity, u64>,
}

impl Subscriptions {
    fn bump(&mut self, entity: WatchedEntity) -> u64 {
        let generation = self.generations.entry(entity).or_default();
        *generation += 1;
        *generation
    }

    fn is_current(&self, entity: WatchedEntity, generation: u64) -> bool {
        self.generations.get(&entity).copied() == Some(generation)
    }
}

/// Tracks the live channel of each watched entity.
///
/// The map lock is never held across a transport call, so a channel open
/// that never completes only stalls its own entity.
pub struct SubscriptionRegistry {
    transport: Option<SharedTransport>,
    subscriptions: Mutex<Subscriptions>,
}

impl SubscriptionRegistry {
    /// Create a registry. `None` models a transport that could not be built.
    pub fn new(transport: Option<SharedTransport>) -> Self {
        Self {
            transport,
            subscriptions: Mutex::new(Subscriptions::default()),
        }
    }

    pub fn transport(&self) -> Option<&SharedTransport> {
        self.transport.as_ref()
    }

    /// Subscribe `listener` to changes of `entity`, replacing any existing
    /// subscription.
    ///
    /// Never fails: every problem is reported through `listener.on_error`.
    /// If another subscribe or an unsubscribe for `entity` lands while the
    /// channel is opening, the newly opened channel is closed again.
    pub async fn subscribe(&self, entity: WatchedEntity, listener: Arc<dyn ChangeListener>) {
        let Some(transport) = self.transport.clone() else {
            warn!("cannot subscribe to {entity}: no realtime transport");
            let err = CrmError::TransportUnavailable("realtime client is not configured".into());
            listener.on_error(entity, &err).await;
            return;
        };

        let (previous, generation) = {
            let mut subs = self.subscriptions.lock().await;
            let previous = subs.active.remove(&entity);
            (previous, subs.bump(entity))
        };
        if let Some(old) = previous {
            debug!("replacing subscription for {entity}");
            Self::teardown(&transport, old).await;
        }

        let channel = match transport.open_channel(entity).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!("subscription to {entity} failed: {e}");
                listener.on_error(entity, &e).await;
                return;
            }
        };

        let (handle, receiver) = channel.into_parts();
        let mut subs = self.subscriptions.lock().await;
        if !subs.is_current(entity, generation) {
            drop(subs);
            debug!("discarding superseded channel {handle}");
            if let Err(e) = transport.close_channel(&handle).await {
                warn!("failed to close channel {handle}: {e}");
            }
            return;
        }
        let dispatcher = tokio::spawn(Self::dispatch(entity, receiver, listener));
        info!("subscribed to {entity} on {handle}");
        subs.active.insert(entity, ChannelSubscription { handle, dispatcher });
    }

    /// Tear down the subscription for `entity`, if any.
    pub async fn unsubscribe(&self, entity: WatchedEntity) -> bool {
        let removed = {
            let mut subs = self.subscriptions.lock().await;
            subs.bump(entity);
            subs.active.remove(&entity)
        };
        match (removed, &self.transport) {
            (Some(sub), Some(transport)) => {
                Self::teardown(transport, sub).await;
                info!("unsubscribed from {entity}");
                true
            }
            (Some(sub), None) => {
                sub.dispatcher.abort();
                true
            }
            (None, _) => false,
        }
    }

    /// Tear down every subscription, including ones still opening.
    pub async fn unsubscribe_all(&self) {
        let drained: Vec<_> = {
            let mut subs = self.subscriptions.lock().await;
            for entity in WatchedEntity::ALL {
                subs.bump(entity);
            }
            subs.active.drain().collect()
        };
        if drained.is_empty() {
            return;
        }
        let count = drained.len();
        for (_, sub) in drained {
            match &self.transport {
                Some(transport) => Self::teardown(transport, sub).await,
                None => sub.dispatcher.abort(),
            }
        }
        info!("removed {count} subscription(s)");
    }

    pub async fn has_active_subscription(&self, entity: WatchedEntity) -> bool {
        self.subscriptions.lock().await.active.contains_key(&entity)
    }

    /// Entities with a live subscription, sorted.
    pub async fn active_entities(&self) -> Vec<WatchedEntity> {
        let mut entities: Vec<_> = self.subscriptions.lock().await.active.keys().copied().collect();
        entities.sort();
        entities
    }

    async fn teardown(transport: &SharedTransport, sub: ChannelSubscription) {
        sub.dispatcher.abort();
        if let Err(e) = transport.close_channel(&sub.handle).await {
            warn!("failed to close channel {}: {e}", sub.handle);
        }
    }

    async fn dispatch(
        entity: WatchedEntity,
        mut receiver: mpsc::Receiver<ChannelMessage>,
        listener: Arc<dyn ChangeListener>,
    ) {
        while let Some(message) = receiver.recv().await {
            match message {
                ChannelMessage::Change(event) if event.entity == entity => {
                    debug!("{} on {entity}", event.kind);
                    listener.on_change(entity, &event).await;
                }
                ChannelMessage::Change(event) => {
                    debug!("ignoring {} event for {} on {entity} channel", event.kind, event.entity);
                }
                ChannelMessage::Failed(reason) => {
                    let err = CrmError::Subscription {
                        entity: entity.to_string(),
                        message: reason,
                    };
                    warn!("{err}");
                    listener.on_error(entity, &err).await;
                }
            }
        }
        debug!("channel for {entity} closed");
    }
}
