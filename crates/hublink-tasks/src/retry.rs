//! Exponential backoff retry policy with jitter.
//!
//! Transient processing failures are retried with exponentially growing
//! delays, randomized to spread redelivery load. The attempt budget is
//! bounded; exceeding it moves the task to the dead-letter state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for transient task failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of processing attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff calculation.
    pub base_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Jitter percentage (0.0 to 1.0) applied to each delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            jitter_factor: 0.25,
        }
    }
}

/// Outcome of a retry decision for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the task at the specified time.
    Retry {
        /// When the next attempt should run.
        next_attempt_at: DateTime<Utc>,
    },
    /// Attempt budget exhausted; move to dead-letter.
    GiveUp {
        /// Why the task should not be retried.
        reason: String,
    },
}

impl RetryPolicy {
    /// Decides whether a failed attempt should be retried.
    ///
    /// `attempt_number` is 1-based and counts the attempt that just
    /// failed.
    pub fn decide(&self, attempt_number: u32, failed_at: DateTime<Utc>) -> RetryDecision {
        if attempt_number >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) exceeded", self.max_attempts),
            };
        }

        let delay = self.delay_for_attempt(attempt_number);
        let next_attempt_at = failed_at
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(300));

        RetryDecision::Retry { next_attempt_at }
    }

    /// Computes the backoff delay for an attempt, with jitter applied.
    ///
    /// Delay doubles each attempt, capped at `max_delay`, then randomized
    /// by up to `jitter_factor` in either direction.
    pub fn delay_for_attempt(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1).min(32);
        let base_ms = self.base_delay.as_millis() as u64;
        let raw_ms = base_ms.saturating_mul(1u64 << exponent.min(63));
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as u64);

        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(capped_ms);
        }

        let jitter_range = (capped_ms as f64 * self.jitter_factor).max(1.0);
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let jittered = (capped_ms as f64 + jitter).max(0.0);

        Duration::from_millis(jittered as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_without_jitter() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn delay_doubles_each_attempt() {
        let policy = policy_without_jitter();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_caps_at_max() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(60));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = policy_without_jitter();
        let decision = policy.decide(4, Utc::now());
        assert!(matches!(decision, RetryDecision::GiveUp { .. }));
    }

    #[test]
    fn retries_below_max_attempts() {
        let policy = policy_without_jitter();
        let failed_at = Utc::now();

        match policy.decide(1, failed_at) {
            RetryDecision::Retry { next_attempt_at } => {
                assert_eq!(next_attempt_at, failed_at + chrono::Duration::seconds(1));
            },
            RetryDecision::GiveUp { reason } => panic!("unexpected give up: {reason}"),
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(600),
            jitter_factor: 0.25,
        };

        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(7_500));
            assert!(delay <= Duration::from_millis(12_500));
        }
    }
}
