//! Retry delay strategies.
//!
//! A strategy maps the number of the attempt that just failed and the
//! configured base delay to the time to wait before the next attempt. There is
//! no jitter and no cap: the total retry budget is bounded solely by the
//! client's `max_attempts`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defines how long to wait between attempts.
///
/// # Examples
///
/// ```
/// use rebound::RetryStrategy;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(1000);
///
/// // Constant: 1s, 1s, 1s...
/// assert_eq!(RetryStrategy::Constant.delay_for_attempt(3, base), base);
///
/// // Linear: 1s, 2s, 3s...
/// assert_eq!(
///     RetryStrategy::Linear.delay_for_attempt(3, base),
///     Duration::from_secs(3)
/// );
///
/// // Exponential: 1s, 4s, 9s...
/// assert_eq!(
///     RetryStrategy::Exponential.delay_for_attempt(3, base),
///     Duration::from_secs(9)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Wait `base` before every retry.
    Constant,

    /// Wait `base * attempt`.
    Linear,

    /// Wait `base * attempt²`.
    #[default]
    Exponential,

    /// Custom delay logic.
    ///
    /// Takes the attempt number (1-indexed) and the base delay and returns the
    /// delay before the next attempt.
    #[serde(skip)]
    Custom {
        /// Function that computes the retry delay.
        delay_fn: fn(attempt: usize, base: Duration) -> Duration,
    },
}

impl RetryStrategy {
    /// Returns the delay to wait after the given attempt failed.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-indexed)
    /// * `base` - The configured base delay
    pub fn delay_for_attempt(&self, attempt: usize, base: Duration) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        match self {
            RetryStrategy::Constant => base,
            RetryStrategy::Linear => base.saturating_mul(factor),
            RetryStrategy::Exponential => base.saturating_mul(factor.saturating_mul(factor)),
            RetryStrategy::Custom { delay_fn } => delay_fn(attempt, base),
        }
    }
}
