//! Remote change-feed transport contract.
//!
//! A transport opens one channel per watched entity and streams
//! `ChannelMessage`s into it. It also owns the authoritative session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crm_core::config::RealtimeConfig;
use crm_core::error::CrmResult;
use crm_models::{ChangeEvent, WatchedEntity};

use crate::local::LocalTransport;
use crate::session::Session;

/// Identifies one open channel on a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    pub id: String,
    pub entity: WatchedEntity,
}

impl ChannelHandle {
    pub fn new(entity: WatchedEntity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity,
        }
    }

    /// Topic name of the channel, `realtime:public:<table>`.
    pub fn topic(&self) -> String {
        format!("realtime:public:{}", self.entity)
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.id.chars().take(8).collect();
        write!(f, "{}#{}", self.topic(), short)
    }
}

/// Anything a channel can deliver.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    /// A row of the watched table changed.
    Change(ChangeEvent),
    /// The subscription failed after the channel was opened.
    Failed(String),
}

/// An open channel: its handle plus the stream of messages.
#[derive(Debug)]
pub struct Channel {
    handle: ChannelHandle,
    receiver: mpsc::Receiver<ChannelMessage>,
}

impl Channel {
    pub fn new(handle: ChannelHandle, receiver: mpsc::Receiver<ChannelMessage>) -> Self {
        Self { handle, receiver }
    }

    pub fn handle(&self) -> &ChannelHandle {
        &self.handle
    }

    pub fn into_parts(self) -> (ChannelHandle, mpsc::Receiver<ChannelMessage>) {
        (self.handle, self.receiver)
    }
}

/// Realtime client used by the subscription registry and the token helper.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Open a new change-feed channel for `entity`.
    async fn open_channel(&self, entity: WatchedEntity) -> CrmResult<Channel>;

    /// Close a channel. Unknown handles are ignored.
    async fn close_channel(&self, handle: &ChannelHandle) -> CrmResult<()>;

    /// Current session, `None` when signed out.
    async fn get_session(&self) -> CrmResult<Option<Session>>;
}

/// The single transport instance shared by every consumer.
pub type SharedTransport = Arc<dyn RealtimeTransport>;

/// Build the transport described by configuration.
///
/// Returns `None` when realtime is disabled, which consumers treat as the
/// transport being unavailable.
pub fn transport_from_config(config: &RealtimeConfig) -> Option<Arc<LocalTransport>> {
    if !config.enabled {
        info!("realtime disabled by configuration, no transport constructed");
        return None;
    }
    Some(Arc::new(LocalTransport::new(config.channel_capacity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_topic_and_display() {
        let handle = ChannelHandle::new(WatchedEntity::Proposals);
        assert_eq!(handle.topic(), "realtime:public:proposals");
        assert!(handle.to_string().starts_with("realtime:public:proposals#"));
        assert_ne!(handle, ChannelHandle::new(WatchedEntity::Proposals));
    }

    #[test]
    fn test_display_shortens_non_ascii_ids() {
        let handle = ChannelHandle {
            id: "ünïcödé-channel".to_string(),
            entity: WatchedEntity::Clients,
        };
        assert_eq!(handle.to_string(), "realtime:public:clients#ünïcödé-");

        let short = ChannelHandle {
            id: "ab".to_string(),
            entity: WatchedEntity::Clients,
        };
        assert_eq!(short.to_string(), "realtime:public:clients#ab");
    }

    #[test]
    fn test_transport_from_config() {
        let mut config = RealtimeConfig::default();
        assert!(transport_from_config(&config).is_some());
        config.enabled = false;
        assert!(transport_from_config(&config).is_none());
    }
}
