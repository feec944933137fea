//! Session tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs of a [`RoomSession`](super::RoomSession).
///
/// Durations are written in JSON as whole milliseconds. Missing fields take
/// their defaults.
///
/// ```rust
/// use codenames_core::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::from_json(r#"{ "heartbeat_interval": 2000 }"#).unwrap();
/// assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
/// assert_eq!(config.max_write_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often the local presence is re-announced
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    /// Upper bound on the presence subscribe handshake
    #[serde(with = "millis")]
    pub subscribe_timeout: Duration,
    /// Conditional write attempts before a stale write is surfaced
    pub max_write_attempts: u32,
    pub history_page_size: usize,
    /// Seed for deck shuffling; entropy when unset
    pub shuffle_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            subscribe_timeout: Duration::from_secs(10),
            max_write_attempts: 3,
            history_page_size: 50,
            shuffle_seed: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_subscribe_timeout(mut self, limit: Duration) -> Self {
        self.subscribe_timeout = limit;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn with_history_page_size(mut self, size: usize) -> Self {
        self.history_page_size = size;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
