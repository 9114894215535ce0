//! Circuit breaker guarding the inference backend.
//!
//! # States
//! - Closed: normal operation, requests pass through, failures counted
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: exactly one probe request tests if the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() after open_duration (grants the probe)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (fresh opened_at)
//! ```
//!
//! # Design Decisions
//! - Single global breaker per orchestrator (one backend)
//! - Closed-state admission is a lock-free atomic read; transitions take the mutex
//! - Half-open callers that are not the probe fail fast or wait, per `HalfOpenPolicy`
//! - The probe permit is a guard: dropping it unresolved frees the probe slot

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::{CircuitBreakerConfig, HalfOpenPolicy};
use crate::error::OrchestratorError;
use crate::observability::MetricsRecorder;
use crate::resilience::timeouts::Deadline;

/// Circuit state. Discriminants match the `ai_brain_circuit_state` gauge.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Open => "open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::HalfOpen,
            2 => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub probe_in_flight: bool,
}

pub struct CircuitBreaker {
    /// Mirrors the authoritative state in `inner`; written only under the lock.
    state: AtomicU8,
    inner: Mutex<Inner>,
    failure_threshold: u32,
    open_duration: Duration,
    half_open_policy: HalfOpenPolicy,
    probe_resolved: Notify,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    metrics: Arc<dyn MetricsRecorder>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig, metrics: Arc<dyn MetricsRecorder>) -> Self {
        metrics.record_circuit_state(CircuitState::Closed);
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(Inner::default()),
            failure_threshold: config.failure_threshold.max(1),
            open_duration: config.open_duration(),
            half_open_policy: config.half_open_policy,
            probe_resolved: Notify::new(),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: self.state(),
            consecutive_failures: inner.consecutive_failures,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            probe_in_flight: inner.probe_in_flight,
        }
    }

    /// Ask to contact the backend. Never blocks and never does I/O.
    pub fn allow(&self) -> Result<CircuitPermit<'_>, OrchestratorError> {
        if self.state() == CircuitState::Closed {
            return Ok(CircuitPermit::new(self, false));
        }

        let mut inner = self.lock();
        match self.state() {
            CircuitState::Closed => Ok(CircuitPermit::new(self, false)),
            CircuitState::Open => {
                let opened_at = *inner.opened_at.get_or_insert_with(Instant::now);
                let open_for = opened_at.elapsed();
                if open_for >= self.open_duration {
                    inner.probe_in_flight = true;
                    self.transition(CircuitState::Open, CircuitState::HalfOpen);
                    tracing::info!("Circuit half-open, admitting probe request");
                    Ok(CircuitPermit::new(self, true))
                } else {
                    Err(OrchestratorError::CircuitOpen {
                        retry_after: self.open_duration - open_for,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(OrchestratorError::CircuitOpen {
                        retry_after: Duration::ZERO,
                    })
                } else {
                    // previous probe was abandoned without an outcome
                    inner.probe_in_flight = true;
                    Ok(CircuitPermit::new(self, true))
                }
            }
        }
    }

    /// Like [`allow`](Self::allow), but under `HalfOpenPolicy::Wait` a caller
    /// that finds a probe in flight waits for it to resolve (bounded by
    /// `deadline`) and then re-evaluates.
    pub async fn admit(&self, deadline: &Deadline) -> Result<CircuitPermit<'_>, OrchestratorError> {
        loop {
            // Register before checking so a resolution in between is not missed.
            let resolved = self.probe_resolved.notified();

            match self.allow() {
                Ok(permit) => return Ok(permit),
                Err(err)
                    if self.half_open_policy == HalfOpenPolicy::Wait
                        && self.state() == CircuitState::HalfOpen =>
                {
                    tracing::debug!("Waiting for half-open probe to resolve");
                    if tokio::time::timeout_at(deadline.instant(), resolved).await.is_err() {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Record a successful backend call.
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        inner.consecutive_failures = 0;

        if self.state() == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            inner.opened_at = None;
            self.transition(CircuitState::HalfOpen, CircuitState::Closed);
            tracing::info!("Probe succeeded, circuit closed");
            self.probe_resolved.notify_waiters();
        }
    }

    /// Record a failed backend call.
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match self.state() {
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.opened_at = Some(Instant::now());
                self.transition(CircuitState::HalfOpen, CircuitState::Open);
                tracing::warn!(
                    open_secs = self.open_duration.as_secs_f64(),
                    "Probe failed, circuit re-opened"
                );
                self.probe_resolved.notify_waiters();
            }
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                inner.opened_at = Some(Instant::now());
                self.transition(CircuitState::Closed, CircuitState::Open);
                tracing::warn!(
                    consecutive_failures = inner.consecutive_failures,
                    open_secs = self.open_duration.as_secs_f64(),
                    "Failure threshold reached, circuit opened"
                );
            }
            _ => {}
        }
    }

    fn abandon_probe(&self) {
        let mut inner = self.lock();
        if self.state() == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::debug!("Probe abandoned without outcome, probe slot released");
            self.probe_resolved.notify_waiters();
        }
    }

    /// Caller must hold the `inner` lock.
    fn transition(&self, from: CircuitState, to: CircuitState) {
        self.state.store(to as u8, Ordering::Release);
        self.metrics.record_circuit_transition(from, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain counters, so a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_threshold", &self.failure_threshold)
            .field("open_duration", &self.open_duration)
            .field("half_open_policy", &self.half_open_policy)
            .finish()
    }
}

/// Permission to make one backend call.
///
/// Resolve it with [`succeed`](Self::succeed) or [`fail`](Self::fail). A probe
/// permit dropped unresolved hands the probe to the next caller.
#[must_use = "an unresolved probe permit is treated as abandoned"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> CircuitPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// True if this permit is the single half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.abandon_probe();
        }
    }
}

impl std::fmt::Debug for CircuitPermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitPermit").field("probe", &self.probe).finish()
    }
}
