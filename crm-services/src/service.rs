//! Service trait and lifecycle state.
//!
//! Every long-lived component of the sync layer implements `Service` so the
//! registry can initialize it in dependency order and shut it down in
//! reverse.

use std::sync::RwLock;

use async_trait::async_trait;

use crm_core::error::CrmResult;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service has been created but not initialized.
    Created,
    /// Service is initializing.
    Initializing,
    /// Service is running and ready.
    Running,
    /// Service is shutting down.
    ShuttingDown,
    /// Service has been stopped.
    Stopped,
    /// Service encountered a fatal error.
    Failed,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Trait that all CRM services must implement.
///
/// Services are shared behind `Arc`, so lifecycle methods take `&self` and
/// keep their state in a `StateCell`.
#[async_trait]
pub trait Service: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Current state of this service.
    fn state(&self) -> ServiceState;

    /// Initialize the service. Called once during application startup.
    async fn init(&self) -> CrmResult<()>;

    /// Gracefully shut down the service. Called during application teardown.
    async fn shutdown(&self) -> CrmResult<()>;

    /// Health check. Returns true if the service is operational.
    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

/// Interior-mutable holder for a service's `ServiceState`.
#[derive(Debug)]
pub struct StateCell(RwLock<ServiceState>);

impl StateCell {
    pub fn new() -> Self {
        Self(RwLock::new(ServiceState::Created))
    }

    pub fn get(&self) -> ServiceState {
        *self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, state: ServiceState) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
