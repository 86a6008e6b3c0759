//! Configuration for the session manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default idle lifetime before a session is swept (1 hour).
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Default number of random bytes behind each session identifier.
/// 32 bytes encode to a 43-character URL-safe token.
pub const DEFAULT_ID_BYTES: usize = 32;

/// Smallest accepted identifier width. Anything shorter is guessable.
pub const MIN_ID_BYTES: usize = 16;

/// Default number of identifier draws per session creation.
pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 3;

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Idle duration after which a session is evicted by the sweep.
    pub max_idle: Duration,

    /// Number of random bytes drawn per identifier.
    pub id_bytes: usize,

    /// Total identifier draws allowed for one `start_session` call.
    pub max_create_attempts: u32,

    /// Period of the background sweep. `None` sweeps every `max_idle`.
    pub sweep_interval: Option<Duration>,

    /// Optional cap on live sessions. The least recently used session is
    /// evicted to make room when a create would exceed it.
    pub max_sessions: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            id_bytes: DEFAULT_ID_BYTES,
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            sweep_interval: None,
            max_sessions: None,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle lifetime.
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the identifier entropy width in bytes.
    pub fn with_id_bytes(mut self, id_bytes: usize) -> Self {
        self.id_bytes = id_bytes;
        self
    }

    /// Set the collision retry bound.
    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts;
        self
    }

    /// Sweep on a fixed period instead of every `max_idle`.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Cap the number of live sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Remove the live session cap.
    pub fn without_max_sessions(mut self) -> Self {
        self.max_sessions = None;
        self
    }

    /// The effective background sweep period.
    pub fn sweep_period(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.max_idle)
    }

    /// Check that the configuration can drive a manager.
    pub fn validate(&self) -> Result<()> {
        if self.max_idle.is_zero() {
            return Err(Error::InvalidConfig("max_idle must be non-zero".into()));
        }
        if self.sweep_period().is_zero() {
            return Err(Error::InvalidConfig(
                "sweep_interval must be non-zero".into(),
            ));
        }
        if self.id_bytes < MIN_ID_BYTES {
            return Err(Error::InvalidConfig(format!(
                "id_bytes must be at least {MIN_ID_BYTES}, got {}",
                self.id_bytes
            )));
        }
        if self.max_create_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_create_attempts must be at least 1".into(),
            ));
        }
        if self.max_sessions == Some(0) {
            return Err(Error::InvalidConfig(
                "max_sessions must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Session settings as they appear in a host application's config file.
///
/// ```toml
/// [session]
/// max_idle_secs = 1800
/// id_bytes = 32
/// max_create_attempts = 3
/// sweep_interval_secs = 60
/// max_sessions = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Idle lifetime in seconds.
    pub max_idle_secs: u64,
    /// Identifier entropy width in bytes.
    pub id_bytes: usize,
    /// Collision retry bound.
    pub max_create_attempts: u32,
    /// Sweep period in seconds; omitted means "every max_idle".
    pub sweep_interval_secs: Option<u64>,
    /// Live session cap; omitted means unbounded.
    pub max_sessions: Option<usize>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_idle_secs: DEFAULT_MAX_IDLE.as_secs(),
            id_bytes: DEFAULT_ID_BYTES,
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            sweep_interval_secs: None,
            max_sessions: None,
        }
    }
}

impl From<SessionSettings> for ManagerConfig {
    fn from(settings: SessionSettings) -> Self {
        Self {
            max_idle: Duration::from_secs(settings.max_idle_secs),
            id_bytes: settings.id_bytes,
            max_create_attempts: settings.max_create_attempts,
            sweep_interval: settings.sweep_interval_secs.map(Duration::from_secs),
            max_sessions: settings.max_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep_period(), DEFAULT_MAX_IDLE);
    }

    #[test]
    fn test_sweep_period_override() {
        let config = ManagerConfig::new()
            .with_max_idle(Duration::from_secs(600))
            .with_sweep_interval(Duration::from_secs(30));
        assert_eq!(config.sweep_period(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_idle = ManagerConfig::new().with_max_idle(Duration::ZERO);
        assert!(matches!(zero_idle.validate(), Err(Error::InvalidConfig(_))));

        let narrow = ManagerConfig::new().with_id_bytes(8);
        assert!(matches!(narrow.validate(), Err(Error::InvalidConfig(_))));

        let no_attempts = ManagerConfig::new().with_max_create_attempts(0);
        assert!(matches!(no_attempts.validate(), Err(Error::InvalidConfig(_))));

        let no_room = ManagerConfig::new().with_max_sessions(0);
        assert!(matches!(no_room.validate(), Err(Error::InvalidConfig(_))));

        let zero_sweep = ManagerConfig::new().with_sweep_interval(Duration::ZERO);
        assert!(matches!(zero_sweep.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_settings_from_toml() {
        let toml_str = r#"
            max_idle_secs = 1800
            sweep_interval_secs = 60
            max_sessions = 500
        "#;
        let settings: SessionSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.id_bytes, DEFAULT_ID_BYTES);

        let config = ManagerConfig::from(settings);
        assert_eq!(config.max_idle, Duration::from_secs(1800));
        assert_eq!(config.sweep_period(), Duration::from_secs(60));
        assert_eq!(config.max_sessions, Some(500));
        assert_eq!(config.max_create_attempts, DEFAULT_MAX_CREATE_ATTEMPTS);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings: SessionSettings = toml::from_str("").unwrap();
        assert_eq!(settings, SessionSettings::default());
        assert!(ManagerConfig::from(settings).validate().is_ok());
    }
}
