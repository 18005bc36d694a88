//! Queue configuration
//!
//! A single immutable [`QueueConfig`] is built at startup and handed to every
//! component at construction time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Configuration for the event queue and long-poll engine
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pulse_core::QueueConfig;
///
/// let config = QueueConfig::default()
///     .with_max_page_size(20)
///     .with_long_poll_timeout(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Maximum events returned per poll; subject queues are trimmed to this size
    pub max_page_size: usize,

    /// Retention stamped on every event and applied as queue expiry
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,

    /// Number of concurrent asynchronous publish writes
    pub worker_pool_size: usize,

    /// Re-poll hint returned for plain polls
    #[serde(with = "duration_millis")]
    pub short_poll_interval: Duration,

    /// Re-poll hint returned for long polls
    #[serde(with = "duration_millis")]
    pub long_poll_interval: Duration,

    /// How long a long poll blocks before returning an empty batch
    #[serde(with = "duration_millis")]
    pub long_poll_timeout: Duration,

    /// Cadence at which a long poll re-queries the store
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Budget for store liveness probes
    #[serde(with = "duration_millis")]
    pub health_check_timeout: Duration,

    /// How long shutdown waits for in-flight publishes
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_page_size: 50,
            default_ttl: Duration::from_secs(300),
            worker_pool_size: 100,
            short_poll_interval: Duration::from_millis(5_000),
            long_poll_interval: Duration::from_millis(30_000),
            long_poll_timeout: Duration::from_millis(25_000),
            tick_interval: Duration::from_secs(1),
            health_check_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables (unset or unparsable values fall back to defaults):
    /// - `MAX_EVENTS_PER_POLL`: page size and trim target (default: 50)
    /// - `DEFAULT_TTL_SECONDS`: event retention (default: 300)
    /// - `WORKER_POOL_SIZE`: async publish slots (default: 100)
    /// - `SHORT_POLL_INTERVAL_MS`: plain poll hint (default: 5000)
    /// - `LONG_POLL_INTERVAL_MS`: long poll hint (default: 30000)
    /// - `LONG_POLL_TIMEOUT_MS`: long poll deadline (default: 25000)
    /// - `POLL_TICK_INTERVAL_MS`: long poll cadence (default: 1000)
    /// - `HEALTH_CHECK_TIMEOUT_MS`: liveness probe budget (default: 2000)
    /// - `SHUTDOWN_TIMEOUT_MS`: publish drain budget (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_page_size: env_parse("MAX_EVENTS_PER_POLL").unwrap_or(defaults.max_page_size),
            default_ttl: env_parse("DEFAULT_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
            worker_pool_size: env_parse("WORKER_POOL_SIZE").unwrap_or(defaults.worker_pool_size),
            short_poll_interval: env_millis("SHORT_POLL_INTERVAL_MS")
                .unwrap_or(defaults.short_poll_interval),
            long_poll_interval: env_millis("LONG_POLL_INTERVAL_MS")
                .unwrap_or(defaults.long_poll_interval),
            long_poll_timeout: env_millis("LONG_POLL_TIMEOUT_MS")
                .unwrap_or(defaults.long_poll_timeout),
            tick_interval: env_millis("POLL_TICK_INTERVAL_MS").unwrap_or(defaults.tick_interval),
            health_check_timeout: env_millis("HEALTH_CHECK_TIMEOUT_MS")
                .unwrap_or(defaults.health_check_timeout),
            shutdown_timeout: env_millis("SHUTDOWN_TIMEOUT_MS")
                .unwrap_or(defaults.shutdown_timeout),
        }
    }

    /// Set the page size (and trim target)
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the default event retention
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the number of async publish slots
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Set the re-poll hints for plain and long polls
    pub fn with_poll_intervals(mut self, short: Duration, long: Duration) -> Self {
        self.short_poll_interval = short;
        self.long_poll_interval = long;
        self
    }

    /// Set the long poll deadline
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Set the long poll cadence
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the health probe budget
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// Set the shutdown drain budget
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_page_size == 0 {
            return Err(QueueError::InvalidConfig(
                "max_page_size must be greater than zero".into(),
            ));
        }
        if self.worker_pool_size == 0 {
            return Err(QueueError::InvalidConfig(
                "worker_pool_size must be greater than zero".into(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(QueueError::InvalidConfig(
                "default_ttl must be greater than zero".into(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(QueueError::InvalidConfig(
                "tick_interval must be greater than zero".into(),
            ));
        }
        if self.health_check_timeout >= self.long_poll_timeout {
            return Err(QueueError::InvalidConfig(
                "health_check_timeout must be shorter than long_poll_timeout".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde support for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
