//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of attempts per request
//! - Compute the sleep between attempts (exponential backoff + jitter)
//!
//! # Design Decisions
//! - Immutable value type, shared by reference without locking
//! - Jitter prevents thundering herd when many callers fail together
//! - Attempt index 0 is the delay after the first failed attempt; the first
//!   attempt itself never waits

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;
use crate::resilience::backoff::{apply_jitter, exponential};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_fraction: config.jitter_fraction.clamp(0.0, 1.0),
        }
    }

    /// Delay before retry `attempt_index` with jitter removed.
    pub fn nominal_delay(&self, attempt_index: u32) -> Duration {
        exponential(attempt_index, self.base_delay, self.multiplier, self.max_delay)
    }

    /// Delay before retry `attempt_index`, jittered with the supplied RNG.
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt_index: u32, rng: &mut R) -> Duration {
        apply_jitter(self.nominal_delay(attempt_index), self.jitter_fraction, rng)
    }

    /// True if `attempt_index` (0-based) is the final allowed attempt.
    pub fn is_last_attempt(&self, attempt_index: u32) -> bool {
        attempt_index + 1 >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1000),
            jitter_fraction: jitter,
        }
    }

    #[test]
    fn test_nominal_delay_monotonic_until_cap() {
        let p = policy(0.0);
        let delays: Vec<_> = (0..8).map(|n| p.nominal_delay(n)).collect();

        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(*delays.last().unwrap(), Duration::from_millis(1000));
    }

    #[test]
    fn test_jittered_delay_within_band() {
        let p = policy(0.2);
        let mut rng = StdRng::seed_from_u64(99);

        for n in 0..6 {
            let nominal = p.nominal_delay(n).as_secs_f64();
            for _ in 0..50 {
                let d = p.delay_for_attempt(n, &mut rng).as_secs_f64();
                assert!(d >= nominal * 0.8 - 1e-9 && d <= nominal * 1.2 + 1e-9, "attempt {n}: {d}");
            }
        }
    }

    #[test]
    fn test_last_attempt() {
        let p = policy(0.0);
        assert!(!p.is_last_attempt(0));
        assert!(!p.is_last_attempt(1));
        assert!(p.is_last_attempt(2));
    }

    #[test]
    fn test_from_config_clamps() {
        let config = RetryConfig {
            max_attempts: 0,
            jitter_fraction: 3.0,
            ..RetryConfig::default()
        };
        let p = RetryPolicy::from_config(&config);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.jitter_fraction, 1.0);
    }
}
