//! CRM Services - the realtime sync layer and its service graph.
//!
//! This crate provides:
//! - `RealtimeBridge`: per-entity subscriptions, change handling and
//!   manual refresh
//! - `TokenSync`: cached credential token reconciliation
//! - `SyncStatusStore`: per-entity status shared with views
//! - `NotificationService`: toasts over tracing, the event bus and the desktop
//! - `SessionLifecycle`: bridge start/stop tied to the session
//! - `ServiceRegistry`: dependency injection and ordered lifecycle
//! - `EventBus`: typed intra-service communication

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod notification;
pub mod status;
pub mod token;
pub mod bridge;
pub mod lifecycle;

// Re-export key types
pub use service::{Service, ServiceState};
pub use registry::{Backends, ServiceRegistry};
pub use event_bus::{AppEvent, EventBus};
pub use notification::{NotificationService, Notifier, Toast, ToastLevel};
pub use status::{StatusSnapshot, SyncStatus, SyncStatusRecord, SyncStatusStore};
pub use token::TokenSync;
pub use bridge::{BridgeDeps, RealtimeBridge};
pub use lifecycle::{SessionLifecycle, SessionPhase};
