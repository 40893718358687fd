//! Client configuration.
//!
//! [`ClientConfig`] is an immutable value captured by a [`Client`](crate::Client)
//! at build time. It can be built in code through
//! [`ClientBuilder`](crate::ClientBuilder) or deserialized from application
//! configuration:
//!
//! ```
//! use rebound::{ClientConfig, RetryStrategy};
//!
//! let config: ClientConfig = serde_json::from_str(
//!     r#"{ "timeout_ms": 2500, "max_attempts": 5, "retry_strategy": "linear" }"#,
//! ).unwrap();
//!
//! assert_eq!(config.max_attempts, 5);
//! assert_eq!(config.retry_strategy, RetryStrategy::Linear);
//! assert_eq!(config.retry_delay.as_millis(), 1000);
//! ```

use crate::RetryStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default number of physical attempts per logical call.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default base delay handed to the [`RetryStrategy`].
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Retry and timeout settings applied to every call made by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for each physical attempt (not for the whole logical call).
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Maximum number of physical attempts, at least 1.
    pub max_attempts: usize,

    /// Base delay passed to the retry strategy.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,

    /// How the delay grows between attempts.
    pub retry_strategy: RetryStrategy,

    /// Whether transport failures (no status code) take the backoff path.
    ///
    /// Off by default: a connection failure or timeout ends the call
    /// immediately, and only status-coded failures are retried.
    pub retry_network_errors: bool,
}

impl ClientConfig {
    /// Returns the configuration with `max_attempts` raised to at least 1.
    pub(crate) fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_strategy: RetryStrategy::default(),
            retry_network_errors: false,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
