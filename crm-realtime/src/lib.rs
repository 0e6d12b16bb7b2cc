//! CRM Realtime - change-feed transport and subscription bookkeeping.
//!
//! This crate provides:
//! - The `RealtimeTransport` contract (channels, sessions)
//! - `LocalTransport`, an in-process change feed driven by local writes
//! - `SubscriptionRegistry`, holding at most one live channel per entity
//!   and dispatching channel messages to a `ChangeListener`

pub mod local;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export key types
pub use local::LocalTransport;
pub use registry::{ChangeListener, SubscriptionRegistry};
pub use session::{Session, SessionUser};
pub use transport::{
    transport_from_config, Channel, ChannelHandle, ChannelMessage, RealtimeTransport,
    SharedTransport,
};
