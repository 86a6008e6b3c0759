//! Backend contract for session storage.
//!
//! [`SessionProvider`] is the capability set the lifecycle manager drives.
//! The in-memory [`MemoryStore`](crate::MemoryStore) is the stock
//! implementation; any other backend that honors the same contract can be
//! handed to [`SessionManager`](crate::SessionManager) unchanged.

use std::time::Duration;

use crate::error::Result;

/// A resolved session as seen by request handlers.
///
/// Every attribute access (`get`, `set` and `delete` alike) counts as
/// activity and resets the session's idle clock.
pub trait SessionHandle: Clone + Send + Sync + 'static {
    /// Attribute value type.
    type Value: Clone + Send + Sync + 'static;

    /// The session identifier handed to the transport.
    fn id(&self) -> &str;

    /// Read an attribute.
    ///
    /// Returns `None` when the key is absent or the session is no longer
    /// live.
    fn get(&self, key: &str) -> Option<Self::Value>;

    /// Insert or overwrite an attribute, returning the previous value.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) once the
    /// session has been destroyed or evicted.
    fn set(&self, key: &str, value: Self::Value) -> Result<Option<Self::Value>>;

    /// Remove an attribute if present, returning it.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) once the
    /// session has been destroyed or evicted.
    fn delete(&self, key: &str) -> Result<Option<Self::Value>>;
}

/// Trait for session storage backends.
pub trait SessionProvider: Send + Sync + 'static {
    /// Handle type returned for live sessions.
    type Session: SessionHandle;

    /// Create an empty session under `id`.
    ///
    /// Fails with [`Error::DuplicateIdentifier`](crate::Error::DuplicateIdentifier)
    /// without touching the existing session when `id` is live.
    fn create(&self, id: &str) -> Result<Self::Session>;

    /// Resolve a live session. Does not count as activity.
    fn read(&self, id: &str) -> Result<Self::Session>;

    /// Mark a session as just used. No-op when `id` is not live.
    fn touch(&self, id: &str);

    /// Remove a session. Idempotent; returns whether anything was removed.
    fn destroy(&self, id: &str) -> bool;

    /// Evict every session idle for at least `max_idle`.
    ///
    /// Returns the number of sessions evicted.
    fn sweep(&self, max_idle: Duration) -> usize;
}
