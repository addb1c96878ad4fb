//! Retry policy for signing-service calls.
//!
//! Implements exponential backoff with configurable parameters.

use super::SignerError;
use crate::config::StreamingSettings;
use rand::Rng;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Cap for exponential growth.
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(config: &StreamingSettings) -> Self {
        Self {
            max_attempts: config.signer_max_attempts,
            initial_backoff_ms: config.signer_initial_backoff_ms,
            max_backoff_ms: config.signer_max_backoff_ms,
            backoff_multiplier: config.signer_backoff_multiplier,
        }
    }

    /// Backoff before retry number `retry` (0 for the first retry):
    /// `initial * multiplier^retry`, capped at `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let backoff = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(backoff.min(self.max_backoff_ms as f64) as u64)
    }

    /// [`backoff`](Self::backoff) plus up to 10% random jitter, so parallel
    /// requests for the same track do not retry in lockstep.
    pub fn jittered_backoff(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let jitter_ms = base.as_millis() as u64 / 10;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Whether a failed attempt (1-based `attempt`) should be followed by
    /// another one.
    pub fn should_retry(&self, error: &SignerError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_config() {
        let config = StreamingSettings {
            signer_max_attempts: 5,
            signer_initial_backoff_ms: 50,
            signer_max_backoff_ms: 400,
            signer_backoff_multiplier: 3.0,
            ..StreamingSettings::default()
        };
        let policy = RetryPolicy::new(&config);

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff_ms, 50);
        assert_eq!(policy.max_backoff_ms, 400);
        assert_eq!(policy.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_default_matches_settings_default() {
        assert_eq!(
            RetryPolicy::default(),
            RetryPolicy::new(&StreamingSettings::default())
        );
    }

    #[test]
    fn test_backoff_calculation_and_cap() {
        let policy = RetryPolicy::default();

        // 200 * 2^n, capped at 2000
        assert_eq!(policy.backoff(0), Duration::from_millis(200));
        assert_eq!(policy.backoff(1), Duration::from_millis(400));
        assert_eq!(policy.backoff(2), Duration::from_millis(800));
        assert_eq!(policy.backoff(3), Duration::from_millis(1600));
        assert_eq!(policy.backoff(4), Duration::from_millis(2000));
        assert_eq!(policy.backoff(30), Duration::from_millis(2000));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let backoff = policy.jittered_backoff(1);
            assert!(backoff >= Duration::from_millis(400));
            assert!(backoff <= Duration::from_millis(440));
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        let transient = SignerError::Transport("connection reset".to_string());
        let rejected = SignerError::Status(404);
        let overloaded = SignerError::Status(503);

        assert!(policy.should_retry(&transient, 1));
        assert!(policy.should_retry(&overloaded, 2));
        assert!(!policy.should_retry(&overloaded, 3));
        assert!(!policy.should_retry(&rejected, 1));
    }
}
