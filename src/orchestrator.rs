//! The orchestrator: one `invoke` entry point around the resilience guards.
//!
//! # Attempt Loop
//! ```text
//! invoke(request)
//!   deadline = min(overall_deadline, caller_deadline)
//!   for attempt in 0..max_attempts:
//!     deadline expired?            → DeadlineExceeded
//!     breaker.admit()              → CircuitOpen (not retried)
//!     queue.acquire(remaining)     → QueueTimeout (not retried)
//!     transport.call() bounded by timeout_for_attempt(attempt, elapsed)
//!       ok   → breaker success, return response
//!       err  → breaker failure; last attempt? → RetriesExhausted
//!              sleep backoff unless it would overrun the deadline
//! ```
//!
//! # Design Decisions
//! - Constructed once and shared by `Arc`; several independently configured
//!   instances can coexist
//! - The queue slot is released before the retry sleep so a backing-off caller
//!   never holds backend capacity
//! - A timed-out in-process model call keeps its slot until the model
//!   actually returns, so the cap bounds real executions
//! - An attempt cut short by the caller's deadline ends the request as
//!   `DeadlineExceeded` and is not charged to the breaker
//! - Dropping the `invoke` future at any suspension point releases the slot
//!   and any half-open probe

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{BrainConfig, CircuitBreakerConfig, QueueConfig};
use crate::error::{BuildError, OrchestratorError, OrchestratorResult, TransportError};
use crate::observability::{MetricsFacade, MetricsRecorder};
use crate::resilience::{
    CircuitBreaker, CircuitSnapshot, Deadline, QueueStats, RequestQueue, RetryPolicy,
    TimeoutStrategy,
};
use crate::transport::{LocalModel, Transport};
use crate::types::{InferenceRequest, InferenceResponse};

/// Health view exposed by `/health` and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSnapshot {
    pub transport: &'static str,
    pub shutting_down: bool,
    pub circuit: CircuitSnapshot,
    pub queue: QueueStats,
}

pub struct AiBrainOrchestrator {
    transport: Transport,
    breaker: CircuitBreaker,
    queue: RequestQueue,
    retry: RetryPolicy,
    timeouts: TimeoutStrategy,
    metrics: Arc<dyn MetricsRecorder>,
    rng: Mutex<StdRng>,
    breaker_config: CircuitBreakerConfig,
    queue_config: QueueConfig,
}

impl AiBrainOrchestrator {
    /// Build an orchestrator around an already constructed transport.
    pub fn new(config: &BrainConfig, transport: Transport) -> Self {
        let metrics: Arc<dyn MetricsRecorder> = Arc::new(MetricsFacade);
        Self {
            transport,
            breaker: CircuitBreaker::new(&config.circuit_breaker, metrics.clone()),
            queue: RequestQueue::new(&config.queue, metrics.clone()),
            retry: RetryPolicy::from_config(&config.retries),
            timeouts: TimeoutStrategy::from_config(&config.timeouts),
            metrics,
            rng: Mutex::new(StdRng::from_entropy()),
            breaker_config: config.circuit_breaker.clone(),
            queue_config: config.queue.clone(),
        }
    }

    /// Build the transport selected by `config.backend.mode`, then the orchestrator.
    pub fn from_config(
        config: &BrainConfig,
        model: Option<Arc<dyn LocalModel>>,
    ) -> Result<Self, BuildError> {
        let transport = Transport::from_config(&config.backend, model)?;
        Ok(Self::new(config, transport))
    }

    /// Replace the metrics sink. Resets breaker and queue, so call before use.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.breaker = CircuitBreaker::new(&self.breaker_config, metrics.clone());
        self.queue = RequestQueue::new(&self.queue_config, metrics.clone());
        self.metrics = metrics;
        self
    }

    /// Make backoff jitter reproducible.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn timeout_strategy(&self) -> &TimeoutStrategy {
        &self.timeouts
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            transport: self.transport.name(),
            shutting_down: self.queue.is_closed(),
            circuit: self.breaker.snapshot(),
            queue: self.queue.stats(),
        }
    }

    /// Stop admitting work. Queued and future callers get `ShuttingDown`;
    /// calls already holding a slot run to completion.
    pub fn shutdown(&self) {
        self.queue.close();
    }

    /// Run one inference request through breaker, queue, timeouts and retries.
    pub async fn invoke(&self, request: InferenceRequest) -> OrchestratorResult<InferenceResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("invoke", %request_id, mode = %request.mode);
        let started = Instant::now();

        let result = self.attempt_loop(&request).instrument(span.clone()).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => {
                self.metrics.record_error(err.kind());
                span.in_scope(|| tracing::warn!(error = %err, "Inference request failed"));
                err.kind()
            }
        };
        self.metrics
            .record_request(request.mode, outcome, started.elapsed());

        result
    }

    async fn attempt_loop(&self, request: &InferenceRequest) -> OrchestratorResult<InferenceResponse> {
        let timeouts = self.timeouts.capped_by(request.caller_deadline);
        let deadline = Deadline::after(timeouts.overall_deadline);
        let mut attempt: u32 = 0;

        loop {
            if deadline.is_expired() {
                return Err(deadline_exceeded(attempt, &deadline));
            }

            let permit = self.breaker.admit(&deadline).await?;

            let slot = match self.queue.acquire(deadline.remaining()).await {
                Ok(slot) => slot,
                Err(OrchestratorError::QueueTimeout { .. }) if deadline.is_expired() => {
                    return Err(deadline_exceeded(attempt, &deadline));
                }
                Err(err) => return Err(err),
            };

            let attempt_timeout = timeouts.timeout_for_attempt(attempt, deadline.elapsed());
            if attempt_timeout.is_zero() {
                return Err(deadline_exceeded(attempt, &deadline));
            }

            tracing::debug!(
                attempt,
                timeout_ms = attempt_timeout.as_millis() as u64,
                probe = permit.is_probe(),
                transport = self.transport.name(),
                "Dispatching inference attempt"
            );

            let result = tokio::time::timeout(
                attempt_timeout,
                self.transport.call(request.mode, &request.payload, slot),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout(attempt_timeout)));

            let attempts_used = attempt + 1;
            if matches!(result, Err(TransportError::Timeout(_))) && timeouts.is_clipped(attempt, attempt_timeout) {
                // Ran out of the caller's budget; the backend is not to blame.
                drop(permit);
                self.metrics.record_attempt("deadline_exceeded");
                return Err(deadline_exceeded(attempts_used, &deadline));
            }

            match result {
                Ok(output) => {
                    permit.succeed();
                    self.metrics.record_attempt("success");
                    tracing::debug!(attempts_used, degraded = output.degraded, "Inference succeeded");
                    return Ok(InferenceResponse {
                        mode: request.mode,
                        raw_text: output.raw_text,
                        parsed_data: output.parsed_data,
                        confidence: output.confidence,
                        attempts_used,
                        degraded: output.degraded,
                    });
                }
                Err(err) => {
                    permit.fail();
                    self.metrics.record_attempt(err.kind());
                    self.metrics.record_error(err.kind());

                    if self.retry.is_last_attempt(attempt) {
                        return Err(OrchestratorError::RetriesExhausted {
                            attempts: attempts_used,
                            source: err,
                        });
                    }

                    let delay = self.next_delay(attempt);
                    if delay >= deadline.remaining() {
                        return Err(deadline_exceeded(attempts_used, &deadline));
                    }

                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Inference attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempts_used;
                }
            }
        }
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.retry.delay_for_attempt(attempt, &mut *rng)
    }
}

impl std::fmt::Debug for AiBrainOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiBrainOrchestrator")
            .field("transport", &self.transport.name())
            .field("breaker", &self.breaker)
            .field("queue", &self.queue)
            .field("retry", &self.retry)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn deadline_exceeded(attempts: u32, deadline: &Deadline) -> OrchestratorError {
    OrchestratorError::DeadlineExceeded {
        attempts,
        elapsed: deadline.elapsed(),
    }
}
