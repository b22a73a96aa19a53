//! Reconnection policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between connection attempts unless configured otherwise.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// When and how often a supervisor retries a failed connection.
///
/// The default retries forever at a fixed one second interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Whether failed attempts are retried at all.
    pub enabled: bool,
    /// Delay before the first retry, in milliseconds.
    pub delay_ms: u64,
    /// Total attempts before giving up (`None` = unbounded).
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the delay after each failed retry.
    pub backoff_factor: f64,
    /// Upper bound for the grown delay, in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_attempts: None,
            backoff_factor: 1.0,
            max_delay_ms: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Override the retry delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Give up after `attempts` connection attempts in total.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Grow the delay by `factor` after each failure, capped at `max_delay`.
    #[must_use]
    pub fn with_backoff(mut self, factor: f64, max_delay: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_delay_ms = Some(u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The base retry delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), or
    /// `None` when the supervisor should give up.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let factor = if self.backoff_factor.is_finite() {
            self.backoff_factor.max(1.0)
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        // `as` saturates on overflow.
        let mut delay_ms = (self.delay_ms as f64 * factor.powi(exponent)) as u64;
        if let Some(cap) = self.max_delay_ms {
            delay_ms = delay_ms.min(cap);
        }
        Some(Duration::from_millis(delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_forever_every_second() {
        let policy = RetryPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.delay(), Duration::from_millis(1000));
        for attempt in [1, 2, 10, 10_000, u32::MAX] {
            assert_eq!(policy.retry_delay(attempt), Some(Duration::from_secs(1)));
        }
    }

    #[test]
    fn test_disabled_never_retries() {
        assert_eq!(RetryPolicy::disabled().retry_delay(1), None);
    }

    #[test]
    fn test_max_attempts() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.retry_delay(1).is_some());
        assert!(policy.retry_delay(2).is_some());
        assert_eq!(policy.retry_delay(3), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default()
            .with_delay(Duration::from_millis(100))
            .with_backoff(2.0, Duration::from_millis(500));
        let delays: Vec<_> = (1..=5)
            .map(|n| policy.retry_delay(n).unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert_eq!(
            policy.retry_delay(u32::MAX),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_backoff_factor_below_one_is_fixed() {
        let mut policy = RetryPolicy::default();
        policy.backoff_factor = 0.5;
        assert_eq!(policy.retry_delay(4), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"delay_ms": 250}"#).unwrap();
        assert_eq!(policy.delay(), Duration::from_millis(250));
        assert!(policy.enabled);
        assert_eq!(policy.max_attempts, None);
    }
}
