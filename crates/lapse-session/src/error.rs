//! Error types for session store and lifecycle operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A live session already uses this identifier.
    #[error("Duplicate session identifier: {0}")]
    DuplicateIdentifier(String),

    /// No live session has this identifier (unknown, destroyed or evicted).
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The random source could not produce identifier bytes.
    #[error("Random source exhausted: {0}")]
    RandomSourceExhausted(String),

    /// Every creation attempt collided with a live identifier.
    #[error("Gave up creating a session after {attempts} identifier collisions")]
    RetryBoundExceeded { attempts: u32 },

    /// Construction parameters were rejected.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error only means "no active session for this identifier".
    ///
    /// Transports should answer this by starting a new session rather than
    /// reporting a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
