//! Session lifecycle manager.
//!
//! The manager issues identifiers, creates sessions in the backing
//! provider (retrying on the rare identifier collision), resolves and
//! destroys sessions on behalf of the transport, and owns the idle
//! expiration policy.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::id::{IdGenerator, RandomIdGenerator, log_id};
use crate::provider::SessionProvider;
use crate::store::MemoryStore;
use crate::sweeper::{SweeperHandle, spawn_sweeper};

/// Session lifecycle manager.
///
/// Owned by the application and passed to whatever handles requests.
/// Cloning shares the provider and identifier source.
pub struct SessionManager<P: SessionProvider = MemoryStore> {
    provider: Arc<P>,
    config: ManagerConfig,
    ids: Arc<dyn IdGenerator>,
}

impl SessionManager<MemoryStore> {
    /// Create a manager over a fresh in-memory store sized by `config`.
    pub fn in_memory(config: ManagerConfig) -> Result<Self> {
        let store = MemoryStore::from_config(&config);
        Self::new(store, config)
    }
}

impl<P: SessionProvider> SessionManager<P> {
    /// Create a manager over `provider`.
    ///
    /// Fails with [`Error::InvalidConfig`] when `config` does not validate.
    pub fn new(provider: P, config: ManagerConfig) -> Result<Self> {
        Self::from_shared(Arc::new(provider), config)
    }

    /// Create a manager over a provider the caller also holds.
    pub fn from_shared(provider: Arc<P>, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let ids = Arc::new(RandomIdGenerator::new(config.id_bytes));

        Ok(Self {
            provider,
            config,
            ids,
        })
    }

    /// Replace the identifier source.
    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Get the backing provider.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Start a new, empty session.
    ///
    /// The returned handle's [`id`](crate::SessionHandle::id) is the token to give
    /// the client. A colliding identifier is regenerated, up to
    /// `max_create_attempts` draws in total.
    ///
    /// # Errors
    ///
    /// [`Error::RandomSourceExhausted`] if the identifier source fails, and
    /// [`Error::RetryBoundExceeded`] if every draw collided.
    pub fn start_session(&self) -> Result<P::Session> {
        let attempts = self.config.max_create_attempts;

        for attempt in 1..=attempts {
            let id = self.ids.generate()?;
            match self.provider.create(&id) {
                Ok(session) => {
                    debug!(session = log_id(&id), attempt = attempt, "Session started");
                    return Ok(session);
                }
                Err(Error::DuplicateIdentifier(_)) => {
                    warn!(attempt = attempt, "Session identifier collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts = attempts, "Giving up on session creation");
        Err(Error::RetryBoundExceeded { attempts })
    }

    /// Resolve a previously issued identifier.
    ///
    /// [`Error::NotFound`] means the client has no active session and
    /// should be given a new one.
    pub fn resolve_session(&self, id: &str) -> Result<P::Session> {
        self.provider.read(id)
    }

    /// Mark a session as just used without reading any attribute.
    pub fn touch_session(&self, id: &str) {
        self.provider.touch(id);
    }

    /// End a session, e.g. on logout. Idempotent.
    pub fn destroy_session(&self, id: &str) -> bool {
        self.provider.destroy(id)
    }

    /// Run one sweep with the configured idle lifetime now.
    pub fn sweep_now(&self) -> usize {
        self.provider.sweep(self.config.max_idle)
    }

    /// Start the recurring background sweep.
    ///
    /// The sweep runs every [`ManagerConfig::sweep_period`] until the
    /// returned handle is shut down or dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        spawn_sweeper(
            Arc::clone(&self.provider),
            self.config.max_idle,
            self.config.sweep_period(),
        )
    }
}

impl<P: SessionProvider> Clone for SessionManager<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            ids: Arc::clone(&self.ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    /// Generator yielding `ids` in order, then repeating the last one.
    fn scripted(ids: &'static [&'static str]) -> impl IdGenerator {
        let next = AtomicUsize::new(0);
        move || -> Result<String> {
            let i = next.fetch_add(1, Ordering::SeqCst).min(ids.len() - 1);
            Ok(ids[i].to_string())
        }
    }

    #[test]
    fn test_start_and_resolve() {
        let manager = SessionManager::in_memory(ManagerConfig::new()).unwrap();
        let session = manager.start_session().unwrap();
        session.set("user", json!("alice")).unwrap();

        let resolved = manager.resolve_session(session.id()).unwrap();
        assert_eq!(resolved.get("user"), Some(json!("alice")));
        assert_eq!(session.id().len(), 43);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = SessionManager::in_memory(ManagerConfig::new().with_id_bytes(4));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_collision_is_retried() {
        let store = MemoryStore::new();
        store.create("taken").unwrap();

        let manager = SessionManager::new(store, ManagerConfig::new())
            .unwrap()
            .with_id_generator(scripted(&["taken", "fresh"]));

        let session = manager.start_session().unwrap();
        assert_eq!(session.id(), "fresh");
        assert_eq!(manager.provider().len(), 2);
    }

    #[test]
    fn test_retry_bound_exceeded() {
        let store = MemoryStore::new();
        store.create("taken").unwrap();

        let manager = SessionManager::new(store, ManagerConfig::new().with_max_create_attempts(4))
            .unwrap()
            .with_id_generator(scripted(&["taken"]));

        let result = manager.start_session();
        assert!(matches!(result, Err(Error::RetryBoundExceeded { attempts: 4 })));
        assert_eq!(manager.provider().len(), 1);
    }

    #[test]
    fn test_random_source_failure_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let manager = SessionManager::in_memory(ManagerConfig::new())
            .unwrap()
            .with_id_generator(move || -> Result<String> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::RandomSourceExhausted("no entropy".into()))
            });

        let result = manager.start_session();
        assert!(matches!(result, Err(Error::RandomSourceExhausted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.provider().is_empty());
    }

    #[test]
    fn test_destroy_then_resolve() {
        let manager = SessionManager::in_memory(ManagerConfig::new()).unwrap();
        let id = manager.start_session().unwrap().id().to_string();

        assert!(manager.destroy_session(&id));
        assert!(!manager.destroy_session(&id));

        let err = manager.resolve_session(&id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_now_uses_max_idle() {
        let config = ManagerConfig::new().with_max_idle(Duration::from_secs(30));
        let manager = SessionManager::in_memory(config).unwrap();

        let idle = manager.start_session().unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        let active = manager.start_session().unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(manager.sweep_now(), 1);
        assert!(manager.resolve_session(idle.id()).unwrap_err().is_not_found());
        assert!(manager.resolve_session(active.id()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_session_defers_eviction() {
        let config = ManagerConfig::new().with_max_idle(Duration::from_secs(30));
        let manager = SessionManager::in_memory(config).unwrap();
        let session = manager.start_session().unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        manager.touch_session(session.id());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(manager.sweep_now(), 0);
        assert!(session.is_live());
    }

    #[test]
    fn test_clones_share_store() {
        let manager = SessionManager::in_memory(ManagerConfig::new()).unwrap();
        let other = manager.clone();

        let session = manager.start_session().unwrap();
        assert!(other.resolve_session(session.id()).is_ok());
    }
}
