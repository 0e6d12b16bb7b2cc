//! In-process realtime transport.
//!
//! Keeps the session and the set of open channels in memory. Writes made
//! through an `ObservedRepository` reach it via `ChangeSink::publish` and are
//! fanned out to every open channel of the affected entity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crm_core::error::{CrmError, CrmResult};
use crm_models::{ChangeEvent, ChangeSink, WatchedEntity};

use crate::session::{Session, SessionUser};
use crate::transport::{Channel, ChannelHandle, ChannelMessage, RealtimeTransport};

struct OpenChannel {
    handle: ChannelHandle,
    sender: mpsc::Sender<ChannelMessage>,
}

#[derive(Default)]
struct LocalState {
    session: Option<Session>,
    channels: HashMap<String, OpenChannel>,
    /// Pending one-shot open failures, keyed by entity.
    open_failures: HashMap<WatchedEntity, String>,
    /// When set, every session read fails with this reason.
    session_failure: Option<String>,
}

/// Transport living entirely inside this process.
pub struct LocalTransport {
    capacity: usize,
    state: Mutex<LocalState>,
}

impl LocalTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LocalState::default()),
        }
    }

    fn lock(&self) -> CrmResult<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|_| CrmError::Internal("local transport state poisoned".into()))
    }

    /// Start a session for `user` with a fresh access token.
    pub fn sign_in(&self, user: SessionUser) -> CrmResult<Session> {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), user);
        info!("local session started for {}", session.user.email);
        self.lock()?.session = Some(session.clone());
        Ok(session)
    }

    /// Replace the session wholesale, e.g. to simulate a token refresh.
    pub fn set_session(&self, session: Option<Session>) -> CrmResult<()> {
        self.lock()?.session = session;
        Ok(())
    }

    pub fn sign_out(&self) -> CrmResult<()> {
        if self.lock()?.session.take().is_some() {
            info!("local session ended");
        }
        Ok(())
    }

    /// Make the next `open_channel` for `entity` fail with `reason`.
    pub fn fail_next_open(&self, entity: WatchedEntity, reason: impl Into<String>) -> CrmResult<()> {
        self.lock()?.open_failures.insert(entity, reason.into());
        Ok(())
    }

    /// Make session reads fail until cleared with `None`.
    pub fn fail_session_calls(&self, reason: Option<String>) -> CrmResult<()> {
        self.lock()?.session_failure = reason;
        Ok(())
    }

    /// Report a subscription failure on every open channel of `entity`.
    ///
    /// Returns the number of channels notified.
    pub fn fail_channel(&self, entity: WatchedEntity, reason: &str) -> CrmResult<usize> {
        let state = self.lock()?;
        Ok(Self::fan_out(&state, entity, || ChannelMessage::Failed(reason.to_string())))
    }

    /// Number of currently open channels for `entity`.
    pub fn open_channel_count(&self, entity: WatchedEntity) -> usize {
        self.lock()
            .map(|state| {
                state
                    .channels
                    .values()
                    .filter(|c| c.handle.entity == entity)
                    .count()
            })
            .unwrap_or(0)
    }

    fn fan_out(
        state: &LocalState,
        entity: WatchedEntity,
        message: impl Fn() -> ChannelMessage,
    ) -> usize {
        let mut delivered = 0;
        for open in state.channels.values().filter(|c| c.handle.entity == entity) {
            match open.sender.try_send(message()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("channel {} is full, dropping message", open.handle);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("channel {} receiver gone", open.handle);
                }
            }
        }
        delivered
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(crm_core::config::RealtimeConfig::default().channel_capacity)
    }
}

#[async_trait]
impl RealtimeTransport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn open_channel(&self, entity: WatchedEntity) -> CrmResult<Channel> {
        let mut state = self.lock()?;
        if let Some(reason) = state.open_failures.remove(&entity) {
            return Err(CrmError::ChannelOpen {
                entity: entity.to_string(),
                message: reason,
            });
        }

        let handle = ChannelHandle::new(entity);
        let (sender, receiver) = mpsc::channel(self.capacity);
        state.channels.insert(
            handle.id.clone(),
            OpenChannel {
                handle: handle.clone(),
                sender,
            },
        );
        debug!("opened channel {handle}");
        Ok(Channel::new(handle, receiver))
    }

    async fn close_channel(&self, handle: &ChannelHandle) -> CrmResult<()> {
        if self.lock()?.channels.remove(&handle.id).is_some() {
            debug!("closed channel {handle}");
        }
        Ok(())
    }

    async fn get_session(&self) -> CrmResult<Option<Session>> {
        let state = self.lock()?;
        if let Some(ref reason) = state.session_failure {
            return Err(CrmError::Session(reason.clone()));
        }
        Ok(state.session.clone().filter(|s| !s.is_expired()))
    }
}

impl ChangeSink for LocalTransport {
    fn publish(&self, event: ChangeEvent) {
        let Ok(state) = self.lock() else {
            warn!("dropping {} event on {}: transport state poisoned", event.kind, event.entity);
            return;
        };
        let entity = event.entity;
        let delivered = Self::fan_out(&state, entity, || ChannelMessage::Change(event.clone()));
        debug!("published {} on {entity} to {delivered} channel(s)", event.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_models::{Record, RecordData};

    fn insert(entity: WatchedEntity) -> ChangeEvent {
        ChangeEvent::insert(entity, Record::with_id("r1", RecordData::new()))
    }

    #[tokio::test]
    async fn test_publish_reaches_only_matching_channels() {
        let transport = LocalTransport::new(8);
        let (_, mut clients) = transport.open_channel(WatchedEntity::Clients).await.unwrap().into_parts();
        let (_, mut orgs) = transport
            .open_channel(WatchedEntity::Organizations)
            .await
            .unwrap()
            .into_parts();

        transport.publish(insert(WatchedEntity::Clients));

        match clients.recv().await.unwrap() {
            ChannelMessage::Change(event) => assert_eq!(event.record_id(), Some("r1")),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(orgs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_channel_ends_stream() {
        let transport = LocalTransport::new(8);
        let (handle, mut rx) = transport.open_channel(WatchedEntity::Clients).await.unwrap().into_parts();
        assert_eq!(transport.open_channel_count(WatchedEntity::Clients), 1);

        transport.close_channel(&handle).await.unwrap();
        assert_eq!(transport.open_channel_count(WatchedEntity::Clients), 0);
        assert!(rx.recv().await.is_none());
        // Closing twice is harmless.
        transport.close_channel(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_next_open_is_one_shot() {
        let transport = LocalTransport::new(8);
        transport.fail_next_open(WatchedEntity::Proposals, "refused").unwrap();

        let err = transport.open_channel(WatchedEntity::Proposals).await.unwrap_err();
        assert!(matches!(err, CrmError::ChannelOpen { .. }));
        assert!(transport.open_channel(WatchedEntity::Proposals).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_channel() {
        let transport = LocalTransport::new(8);
        let (_, mut rx) = transport.open_channel(WatchedEntity::Clients).await.unwrap().into_parts();
        assert_eq!(transport.fail_channel(WatchedEntity::Clients, "boom").unwrap(), 1);
        assert!(matches!(rx.recv().await, Some(ChannelMessage::Failed(r)) if r == "boom"));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let transport = LocalTransport::default();
        assert!(transport.get_session().await.unwrap().is_none());

        let session = transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();
        assert_eq!(transport.get_session().await.unwrap(), Some(session));

        transport.fail_session_calls(Some("offline".into())).unwrap();
        assert!(transport.get_session().await.is_err());
        transport.fail_session_calls(None).unwrap();

        transport.sign_out().unwrap();
        assert!(transport.get_session().await.unwrap().is_none());
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let transport = LocalTransport::new(1);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let channel = rt.block_on(transport.open_channel(WatchedEntity::Clients)).unwrap();

        transport.publish(insert(WatchedEntity::Clients));
        transport.publish(insert(WatchedEntity::Clients));
        let (_, mut rx) = channel.into_parts();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
