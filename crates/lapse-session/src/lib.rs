//! Ephemeral server-side sessions with idle expiration.
//!
//! This crate provides:
//! - An in-memory session store with O(1) lookup and strict LRU ordering
//! - A lifecycle manager issuing unguessable, URL-safe session identifiers
//! - A background sweep evicting sessions idle past a configured lifetime
//!
//! Carrying the identifier to the client (cookie, header) is left to the
//! caller; the manager only hands out and accepts opaque strings.
//!
//! # Example
//!
//! ```rust,ignore
//! use lapse_session::{ManagerConfig, SessionManager};
//!
//! let config = ManagerConfig::new().with_max_idle(Duration::from_secs(1800));
//! let manager = SessionManager::in_memory(config)?;
//! let sweeper = manager.spawn_sweeper();
//!
//! let session = manager.start_session()?;
//! session.set("user_id", json!(42))?;
//! let token = session.id().to_string();
//!
//! // Later, on the next request carrying `token`:
//! match manager.resolve_session(&token) {
//!     Ok(session) => { /* use it */ }
//!     Err(e) if e.is_not_found() => { /* start a new one */ }
//!     Err(e) => return Err(e.into()),
//! }
//!
//! sweeper.shutdown().await;
//! ```

mod config;
mod error;
mod id;
mod manager;
mod provider;
mod store;
mod sweeper;

pub use config::{
    DEFAULT_ID_BYTES, DEFAULT_MAX_CREATE_ATTEMPTS, DEFAULT_MAX_IDLE, MIN_ID_BYTES, ManagerConfig,
    SessionSettings,
};
pub use error::{Error, Result};
pub use id::{IdGenerator, RandomIdGenerator};
pub use manager::SessionManager;
pub use provider::{SessionHandle, SessionProvider};
pub use store::{MemorySession, MemoryStore, SessionSnapshot, StoreStats};
pub use sweeper::{SweeperHandle, spawn_sweeper};
