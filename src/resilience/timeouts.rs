//! Timeout enforcement.
//!
//! # Responsibilities
//! - Compute a per-attempt timeout that grows across retries
//! - Clip every timeout to what is left of the overall request deadline
//! - Track the deadline of a single request across all suspension points
//!
//! # Design Decisions
//! - Uses Tokio's clock so paused-time tests drive deadlines
//! - Early attempts fail fast; later attempts get more time to let a
//!   recovering backend warm up
//! - A zero remainder means "deadline exceeded", never a zero-timeout call

use std::time::Duration;
use tokio::time::Instant;

use crate::config::TimeoutConfig;
use crate::resilience::backoff::exponential;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutStrategy {
    pub base_timeout: Duration,
    pub escalation_factor: f64,
    pub max_timeout: Duration,
    pub overall_deadline: Duration,
}

impl TimeoutStrategy {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            base_timeout: Duration::from_millis(config.base_timeout_ms),
            escalation_factor: config.escalation_factor,
            max_timeout: Duration::from_millis(config.max_timeout_ms),
            overall_deadline: Duration::from_millis(config.overall_deadline_ms),
        }
    }

    /// Tighten the overall deadline to a caller-provided bound, if shorter.
    pub fn capped_by(self, caller_deadline: Option<Duration>) -> Self {
        match caller_deadline {
            Some(d) if d < self.overall_deadline => Self { overall_deadline: d, ..self },
            _ => self,
        }
    }

    /// Escalated timeout for attempt `attempt_index` before deadline clipping.
    pub fn escalated(&self, attempt_index: u32) -> Duration {
        exponential(
            attempt_index,
            self.base_timeout,
            self.escalation_factor,
            self.max_timeout,
        )
    }

    /// Timeout for attempt `attempt_index` (0-based) given the time already
    /// spent. Returns `Duration::ZERO` once the overall deadline is used up.
    pub fn timeout_for_attempt(&self, attempt_index: u32, elapsed: Duration) -> Duration {
        self.escalated(attempt_index)
            .min(self.overall_deadline.saturating_sub(elapsed))
    }

    /// Whether the deadline, not the escalation schedule, set this attempt's timeout.
    pub fn is_clipped(&self, attempt_index: u32, attempt_timeout: Duration) -> bool {
        attempt_timeout < self.escalated(attempt_index)
    }
}

impl Default for TimeoutStrategy {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

/// Wall-clock budget of one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline of `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Absolute instant the deadline falls on.
    pub fn instant(&self) -> Instant {
        self.started + self.budget
    }
}
