//! In-memory session store with LRU ordering.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::id::log_id;
use crate::provider::{SessionHandle, SessionProvider};

/// One session's state.
struct Record<V> {
    /// Distinguishes this record from an earlier one under the same id.
    generation: u64,
    last_accessed: Instant,
    created_at: DateTime<Utc>,
    attributes: HashMap<String, V>,
}

impl<V> Record<V> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            last_accessed: Instant::now(),
            created_at: Utc::now(),
            attributes: HashMap::new(),
        }
    }
}

/// State protected by the store lock.
struct StoreInner<V> {
    /// Index and recency list. Front is most recently used.
    lru: LruCache<String, Record<V>>,
    next_generation: u64,
    created: u64,
    destroyed: u64,
    evicted: u64,
}

impl<V> StoreInner<V> {
    /// Whether `id` is live and still the record a handle was issued for.
    fn is_current(&self, id: &str, generation: u64) -> bool {
        self.lru
            .peek(id)
            .is_some_and(|record| record.generation == generation)
    }
}

/// In-memory session store.
///
/// A single lock guards both the index and the recency list, so every
/// operation (reads included, since attribute reads re-order the list)
/// observes a consistent pair. Cloning shares the same underlying store.
pub struct MemoryStore<V = Value> {
    inner: Arc<Mutex<StoreInner<V>>>,
    capacity: Option<NonZeroUsize>,
}

impl MemoryStore<Value> {
    /// Create an unbounded store holding JSON attribute values.
    pub fn new() -> Self {
        Self::bounded(None)
    }
}

impl<V> MemoryStore<V> {
    /// Create a store holding at most `max_sessions` sessions.
    ///
    /// `None` (or zero) means no cap; sessions then leave only through
    /// destroy or sweep.
    pub fn bounded(max_sessions: Option<usize>) -> Self {
        let capacity = max_sessions.and_then(NonZeroUsize::new);
        let lru = match capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                lru,
                next_generation: 0,
                created: 0,
                destroyed: 0,
                evicted: 0,
            })),
            capacity,
        }
    }

    /// Create a store sized by the manager configuration.
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::bounded(config.max_sessions)
    }

    /// Get the current number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Check if a session is live without touching it.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().lru.contains(id)
    }

    /// Live session ids, most recently used first.
    pub fn recency_order(&self) -> Vec<String> {
        self.inner
            .lock()
            .lru
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Point-in-time view of every live session, most recently used first.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.inner
            .lock()
            .lru
            .iter()
            .map(|(id, record)| SessionSnapshot {
                id: id.clone(),
                last_accessed: record.last_accessed,
                created_at: record.created_at,
                attribute_count: record.attributes.len(),
            })
            .collect()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            live: inner.lru.len(),
            capacity: self.capacity.map(NonZeroUsize::get),
            created_total: inner.created,
            destroyed_total: inner.destroyed,
            evicted_total: inner.evicted,
        }
    }

    /// Drop every session. Counted as destroyed.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.lru.len() as u64;
        inner.lru.clear();
        inner.destroyed += count;
        debug!(count = count, "Cleared session store");
    }

    /// Create an empty session under `id`.
    ///
    /// When the store is at capacity the least recently used session is
    /// evicted to make room.
    pub fn create(&self, id: &str) -> Result<MemorySession<V>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.lru.contains(id) {
            return Err(Error::DuplicateIdentifier(id.to_string()));
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;

        // The key is known to be new, so anything pushed out is an eviction.
        if let Some((evicted_id, _)) = inner.lru.push(id.to_string(), Record::new(generation)) {
            debug!(session = log_id(&evicted_id), "Evicting LRU session to make room");
            inner.evicted += 1;
        }
        inner.created += 1;

        trace!(session = log_id(id), live = inner.lru.len(), "Session created");

        Ok(MemorySession {
            id: Arc::from(id),
            generation,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Resolve a live session without touching it.
    pub fn read(&self, id: &str) -> Result<MemorySession<V>> {
        let inner = self.inner.lock();
        match inner.lru.peek(id) {
            Some(record) => Ok(MemorySession {
                id: Arc::from(id),
                generation: record.generation,
                inner: Arc::clone(&self.inner),
            }),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Stamp a session as just used and move it to the front.
    pub fn touch(&self, id: &str) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.lru.get_mut(id) {
            record.last_accessed = Instant::now();
            trace!(session = log_id(id), "Session touched");
        }
    }

    /// Remove a session if present.
    pub fn destroy(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.lru.pop(id).is_some() {
            inner.destroyed += 1;
            debug!(session = log_id(id), "Session destroyed");
            true
        } else {
            false
        }
    }

    /// Evict sessions idle for at least `max_idle`, oldest first.
    ///
    /// The recency list is sorted by last access, so the scan stops at the
    /// first session that is still fresh.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = Instant::now();
        let mut count = 0;

        loop {
            let expired = inner.lru.peek_lru().is_some_and(|(_, record)| {
                now.saturating_duration_since(record.last_accessed) >= max_idle
            });
            if !expired {
                break;
            }
            if let Some((id, _)) = inner.lru.pop_lru() {
                debug!(session = log_id(&id), "Evicting idle session");
                count += 1;
            }
        }

        inner.evicted += count as u64;
        if count > 0 {
            debug!(count = count, live = inner.lru.len(), "Swept idle sessions");
        }

        count
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::bounded(None)
    }
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> SessionProvider for MemoryStore<V> {
    type Session = MemorySession<V>;

    fn create(&self, id: &str) -> Result<MemorySession<V>> {
        MemoryStore::create(self, id)
    }

    fn read(&self, id: &str) -> Result<MemorySession<V>> {
        MemoryStore::read(self, id)
    }

    fn touch(&self, id: &str) {
        MemoryStore::touch(self, id);
    }

    fn destroy(&self, id: &str) -> bool {
        MemoryStore::destroy(self, id)
    }

    fn sweep(&self, max_idle: Duration) -> usize {
        MemoryStore::sweep(self, max_idle)
    }
}

/// Handle to one session in a [`MemoryStore`].
///
/// Handles stay valid to hold after the session ends; they simply stop
/// seeing it. A handle never reaches a later session that happens to reuse
/// the same id.
pub struct MemorySession<V = Value> {
    id: Arc<str>,
    generation: u64,
    inner: Arc<Mutex<StoreInner<V>>>,
}

impl<V> MemorySession<V> {
    /// The session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run `f` on the record after touching it, all under one lock.
    fn with_touched<R>(&self, f: impl FnOnce(&mut Record<V>) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        if !inner.is_current(&self.id, self.generation) {
            return None;
        }
        let record = inner.lru.get_mut(&*self.id)?;
        record.last_accessed = Instant::now();
        Some(f(record))
    }

    /// Read the record without touching it.
    fn with_peeked<R>(&self, f: impl FnOnce(&Record<V>) -> R) -> Option<R> {
        let inner = self.inner.lock();
        inner
            .lru
            .peek(&*self.id)
            .filter(|record| record.generation == self.generation)
            .map(f)
    }

    /// Whether the session is still live.
    pub fn is_live(&self) -> bool {
        self.inner.lock().is_current(&self.id, self.generation)
    }

    /// Last access time, without counting as an access.
    pub fn last_accessed(&self) -> Option<Instant> {
        self.with_peeked(|record| record.last_accessed)
    }

    /// Creation time, without counting as an access.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.with_peeked(|record| record.created_at)
    }

    /// Attribute keys, without counting as an access.
    pub fn keys(&self) -> Vec<String> {
        self.with_peeked(|record| record.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of attributes, without counting as an access.
    pub fn len(&self) -> usize {
        self.with_peeked(|record| record.attributes.len())
            .unwrap_or(0)
    }

    /// Whether the session holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> MemorySession<V> {
    /// Read an attribute and touch the session.
    pub fn get(&self, key: &str) -> Option<V> {
        self.with_touched(|record| record.attributes.get(key).cloned())
            .flatten()
    }
}

impl<V> MemorySession<V> {
    /// Insert or overwrite an attribute and touch the session.
    pub fn set(&self, key: impl Into<String>, value: V) -> Result<Option<V>> {
        let key = key.into();
        self.with_touched(|record| record.attributes.insert(key, value))
            .ok_or_else(|| Error::NotFound(self.id.to_string()))
    }

    /// Remove an attribute if present and touch the session.
    pub fn delete(&self, key: &str) -> Result<Option<V>> {
        self.with_touched(|record| record.attributes.remove(key))
            .ok_or_else(|| Error::NotFound(self.id.to_string()))
    }
}

impl<V> Clone for MemorySession<V> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            generation: self.generation,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for MemorySession<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<V: Clone + Send + Sync + 'static> SessionHandle for MemorySession<V> {
    type Value = V;

    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<V> {
        MemorySession::get(self, key)
    }

    fn set(&self, key: &str, value: V) -> Result<Option<V>> {
        MemorySession::set(self, key, value)
    }

    fn delete(&self, key: &str) -> Result<Option<V>> {
        MemorySession::delete(self, key)
    }
}

/// Point-in-time view of one live session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: String,
    /// Last access time.
    pub last_accessed: Instant,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Number of attributes held.
    pub attribute_count: usize,
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Current number of live sessions.
    pub live: usize,

    /// Live session cap, if any.
    pub capacity: Option<usize>,

    /// Sessions created since the store was built.
    pub created_total: u64,

    /// Sessions removed by destroy or clear.
    pub destroyed_total: u64,

    /// Sessions removed by sweep or capacity pressure.
    pub evicted_total: u64,
}
