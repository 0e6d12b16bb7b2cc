//! UI notification surface.
//!
//! Toasts are logged, published on the event bus for whatever view is
//! attached, and optionally shown as native desktop notifications.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crm_core::config::NotificationConfig;
use crm_core::error::CrmResult;

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState, StateCell};

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

impl std::fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A short user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub body: String,
}

impl Toast {
    pub fn new(level: ToastLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, title, body)
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, title, body)
    }
}

/// Anything that can surface a toast to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Default notifier: tracing + event bus + optional desktop notification.
pub struct NotificationService {
    state: StateCell,
    event_bus: EventBus,
    /// Whether native desktop notifications are shown.
    desktop: bool,
    delivered: AtomicUsize,
}

impl NotificationService {
    pub fn new(event_bus: EventBus, config: &NotificationConfig) -> Self {
        Self {
            state: StateCell::new(),
            event_bus,
            desktop: config.desktop,
            delivered: AtomicUsize::new(0),
        }
    }

    /// Number of toasts raised since startup.
    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    #[cfg(not(test))]
    fn show_desktop(&self, toast: &Toast) -> CrmResult<()> {
        notify_rust::Notification::new()
            .summary(&toast.title)
            .body(&toast.body)
            .appname(crm_core::constants::APP_NAME)
            .show()
            .map_err(|e| crm_core::error::CrmError::Notification(e.to_string()))?;
        Ok(())
    }

    /// Unit tests never reach the desktop notification daemon.
    #[cfg(test)]
    fn show_desktop(&self, toast: &Toast) -> CrmResult<()> {
        debug!("desktop notification skipped: {}", toast.title);
        Ok(())
    }
}

impl Notifier for NotificationService {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => error!("toast: {} - {}", toast.title, toast.body),
            ToastLevel::Info | ToastLevel::Success => info!("toast: {} - {}", toast.title, toast.body),
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);

        if self.desktop {
            if let Err(e) = self.show_desktop(&toast) {
                warn!("desktop notification failed: {e}");
            }
        }
        self.event_bus.emit(AppEvent::Toast(toast));
    }
}

#[async_trait]
impl Service for NotificationService {
    fn name(&self) -> &str {
        "notification"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CrmResult<()> {
        self.state.set(ServiceState::Running);
        debug!(
            "notification service initialized (desktop: {})",
            if self.desktop { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    async fn shutdown(&self) -> CrmResult<()> {
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}
