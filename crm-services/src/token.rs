//! Token sync helper.
//!
//! The transport and the HTTP layer authenticate independently, so the
//! access token is mirrored into the local key-value cache. The remote
//! session is always the source of truth.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crm_core::constants::cache_keys;
use crm_core::error::{CrmError, CrmResult};
use crm_models::KeyValueCache;
use crm_realtime::{Session, SessionUser, SharedTransport};

use crate::service::{Service, ServiceState, StateCell};

/// Keeps the cached credential token aligned with the remote session.
pub struct TokenSync {
    state: StateCell,
    transport: Option<SharedTransport>,
    cache: Arc<dyn KeyValueCache>,
}

impl TokenSync {
    pub fn new(transport: Option<SharedTransport>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            state: StateCell::new(),
            transport,
            cache,
        }
    }

    async fn remote_session(&self) -> CrmResult<Option<Session>> {
        match self.transport {
            Some(ref transport) => transport.get_session().await,
            None => Err(CrmError::TransportUnavailable(
                "no realtime client to read the session from".into(),
            )),
        }
    }

    /// Copy the remote session into the cache.
    ///
    /// Returns true when a session exists. Never fails: a session read
    /// error is logged and reported as `false` with the cache untouched.
    pub async fn sync_token(&self) -> bool {
        match self.remote_session().await {
            Ok(Some(session)) => match self.store(&session) {
                Ok(()) => {
                    debug!("token synced for {}", session.user.email);
                    true
                }
                Err(e) => {
                    warn!("failed to cache session token: {e}");
                    false
                }
            },
            Ok(None) => {
                self.clear();
                false
            }
            Err(e) => {
                warn!("token sync skipped, session unavailable: {e}");
                false
            }
        }
    }

    /// Cached token, if any.
    pub fn get_token(&self) -> Option<String> {
        self.cache.get(cache_keys::AUTH_TOKEN).unwrap_or_else(|e| {
            warn!("failed to read cached token: {e}");
            None
        })
    }

    /// Cached session user, if any.
    pub fn get_user(&self) -> Option<SessionUser> {
        let raw = self.cache.get(cache_keys::AUTH_USER).unwrap_or_else(|e| {
            warn!("failed to read cached user: {e}");
            None
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| warn!("discarding malformed cached user: {e}"))
            .ok()
    }

    /// Check the cached token against the remote session.
    ///
    /// A mismatch or a missing session clears the cache.
    pub async fn validate_token(&self) -> bool {
        let Some(cached) = self.get_token() else {
            return false;
        };

        match self.remote_session().await {
            Ok(Some(session)) if session.access_token == cached => true,
            Ok(Some(_)) => {
                info!("cached token does not match the session, clearing");
                self.clear();
                false
            }
            Ok(None) => {
                info!("no session for cached token, clearing");
                self.clear();
                false
            }
            Err(e) => {
                warn!("token validation failed: {e}");
                false
            }
        }
    }

    /// Remove the cached token and user.
    pub fn clear(&self) {
        for key in [cache_keys::AUTH_TOKEN, cache_keys::AUTH_USER] {
            if let Err(e) = self.cache.remove(key) {
                warn!("failed to remove {key} from cache: {e}");
            }
        }
    }

    fn store(&self, session: &Session) -> CrmResult<()> {
        let user = serde_json::to_string(&session.user)?;
        self.cache.set(cache_keys::AUTH_TOKEN, &session.access_token)?;
        self.cache.set(cache_keys::AUTH_USER, &user)?;
        Ok(())
    }
}

#[async_trait]
impl Service for TokenSync {
    fn name(&self) -> &str {
        "token_sync"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CrmResult<()> {
        self.state.set(ServiceState::Initializing);
        // Drop a token left behind by a session that ended while offline.
        if self.get_token().is_some() && !self.validate_token().await {
            debug!("stale cached token discarded on startup");
        }
        self.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> CrmResult<()> {
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_models::MemoryKeyValueCache;
    use crm_realtime::LocalTransport;

    fn setup() -> (Arc<LocalTransport>, Arc<MemoryKeyValueCache>, TokenSync) {
        let transport = Arc::new(LocalTransport::default());
        let cache = Arc::new(MemoryKeyValueCache::new());
        let sync = TokenSync::new(Some(transport.clone() as SharedTransport), cache.clone());
        (transport, cache, sync)
    }

    #[tokio::test]
    async fn test_sync_with_session_caches_token_and_user() {
        let (transport, _, sync) = setup();
        let session = transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();

        assert!(sync.sync_token().await);
        assert_eq!(sync.get_token(), Some(session.access_token));
        assert_eq!(sync.get_user().map(|u| u.email), Some("rep@example.com".into()));
    }

    #[tokio::test]
    async fn test_sync_without_session_clears_cache() {
        let (_, cache, sync) = setup();
        cache.set(cache_keys::AUTH_TOKEN, "stale").unwrap();
        cache.set(cache_keys::AUTH_USER, "{}").unwrap();

        assert!(!sync.sync_token().await);
        assert_eq!(sync.get_token(), None);
        assert_eq!(cache.get(cache_keys::AUTH_USER).unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_failure_is_not_an_error() {
        let (transport, cache, sync) = setup();
        cache.set(cache_keys::AUTH_TOKEN, "kept").unwrap();
        transport.fail_session_calls(Some("offline".into())).unwrap();

        assert!(!sync.sync_token().await);
        assert!(!sync.validate_token().await);
        assert_eq!(sync.get_token().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_validate_token() {
        let (transport, cache, sync) = setup();
        assert!(!sync.validate_token().await);

        transport.sign_in(SessionUser::new("u1", "rep@example.com")).unwrap();
        assert!(sync.sync_token().await);
        assert!(sync.validate_token().await);

        cache.set(cache_keys::AUTH_TOKEN, "someone-else").unwrap();
        assert!(!sync.validate_token().await);
        assert_eq!(sync.get_token(), None);
    }

    #[tokio::test]
    async fn test_missing_transport() {
        let cache = Arc::new(MemoryKeyValueCache::new());
        let sync = TokenSync::new(None, cache);
        assert!(!sync.sync_token().await);
        assert_eq!(sync.get_user(), None);
    }
}
