//! Session lifecycle.
//!
//! Ties the realtime bridge to authentication: the bridge runs exactly while
//! a session is active.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crm_core::error::CrmResult;

use crate::bridge::RealtimeBridge;
use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState, StateCell};
use crate::token::TokenSync;

/// Authentication phase of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session; the bridge is idle.
    SignedOut,
    /// A session appeared and the bridge is starting.
    Starting,
    /// The bridge is running for the current session.
    Active,
    /// The session ended and the bridge is being torn down.
    Stopping,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedOut => write!(f, "signed_out"),
            Self::Starting => write!(f, "starting"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Phase plus the bookkeeping needed to supersede an in-flight start.
struct Transition {
    phase: SessionPhase,
    /// Bumped by every sign-in and sign-out.
    epoch: u64,
    /// Bridge start spawned by the latest sign-in, until it finishes.
    starting: Option<JoinHandle<()>>,
}

/// Starts and stops the bridge as the session comes and goes.
pub struct SessionLifecycle {
    state: StateCell,
    bridge: Arc<RealtimeBridge>,
    token_sync: Arc<TokenSync>,
    event_bus: EventBus,
    /// Never held while the bridge starts, so a sign-out can cancel it.
    transition: Mutex<Transition>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl SessionLifecycle {
    pub fn new(bridge: Arc<RealtimeBridge>, token_sync: Arc<TokenSync>, event_bus: EventBus) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::SignedOut);
        Self {
            state: StateCell::new(),
            bridge,
            token_sync,
            event_bus,
            transition: Mutex::new(Transition {
                phase: SessionPhase::SignedOut,
                epoch: 0,
                starting: None,
            }),
            phase_tx,
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.transition.lock().await.phase
    }

    pub fn phase_receiver(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, current: &mut Transition, next: SessionPhase) {
        if current.phase != next {
            info!("session phase: {} -> {}", current.phase, next);
            current.phase = next;
            self.phase_tx.send_replace(next);
        }
    }

    /// A session became active: start the bridge.
    ///
    /// The start runs as its own task. A sign-out or shutdown that lands
    /// meanwhile cancels it, and this call returns without going active.
    pub async fn on_signed_in(&self) {
        let (epoch, started) = {
            let mut t = self.transition.lock().await;
            if matches!(t.phase, SessionPhase::Active | SessionPhase::Starting) {
                debug!("bridge already running, ignoring sign-in");
                return;
            }
            t.epoch += 1;
            self.set_phase(&mut t, SessionPhase::Starting);

            let (done_tx, done_rx) = oneshot::channel();
            let bridge = self.bridge.clone();
            t.starting = Some(tokio::spawn(async move {
                bridge.start().await;
                let _ = done_tx.send(());
            }));
            (t.epoch, done_rx)
        };

        // The sender is dropped without sending when the start is aborted.
        let completed = started.await.is_ok();

        let mut t = self.transition.lock().await;
        if !completed || t.epoch != epoch {
            debug!("bridge start superseded");
            return;
        }
        t.starting = None;
        self.set_phase(&mut t, SessionPhase::Active);
        drop(t);

        self.event_bus.emit(AppEvent::SessionChanged {
            signed_in: true,
            email: self.token_sync.get_user().map(|u| u.email),
        });
    }

    /// Cancel any pending start, then stop the bridge.
    async fn stop_bridge(&self, t: &mut Transition) {
        t.epoch += 1;
        self.set_phase(t, SessionPhase::Stopping);
        if let Some(task) = t.starting.take() {
            task.abort();
            // Wait for the task to unwind so it cannot subscribe after the stop.
            let _ = task.await;
        }
        self.bridge.stop().await;
    }

    /// The session ended: stop the bridge and forget the cached token.
    pub async fn on_signed_out(&self) {
        let mut t = self.transition.lock().await;
        let was_running = t.phase != SessionPhase::SignedOut;

        self.stop_bridge(&mut t).await;
        self.token_sync.clear();
        self.set_phase(&mut t, SessionPhase::SignedOut);
        drop(t);

        if was_running {
            self.event_bus.emit(AppEvent::SessionChanged {
                signed_in: false,
                email: None,
            });
        }
    }

    /// Reconcile with the remote session, e.g. after startup.
    pub async fn resume(&self) {
        if self.token_sync.sync_token().await {
            self.on_signed_in().await;
        } else if self.phase().await != SessionPhase::SignedOut {
            self.on_signed_out().await;
        }
    }
}

#[async_trait]
impl Service for SessionLifecycle {
    fn name(&self) -> &str {
        "session_lifecycle"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CrmResult<()> {
        self.state.set(ServiceState::Initializing);
        self.resume().await;
        self.state.set(ServiceState::Running);
        info!("session lifecycle initialized (phase: {})", self.phase().await);
        Ok(())
    }

    async fn shutdown(&self) -> CrmResult<()> {
        self.state.set(ServiceState::ShuttingDown);
        let mut t = self.transition.lock().await;
        if t.phase != SessionPhase::SignedOut {
            // Keep the cached token: the session outlives the process.
            self.stop_bridge(&mut t).await;
            self.set_phase(&mut t, SessionPhase::SignedOut);
        } else {
            debug!("session lifecycle shut down while signed out");
        }
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}
