//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ai_brain_attempts_total` (counter): attempts by outcome (`success` or error kind)
//! - `ai_brain_requests_total` (counter): finished invocations by mode, outcome
//! - `ai_brain_errors_total` (counter): failures by kind
//! - `ai_brain_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `ai_brain_circuit_transitions_total` (counter): state changes by from/to
//! - `ai_brain_queue_depth` (gauge): callers waiting for a slot
//! - `ai_brain_in_flight` (gauge): callers holding a slot
//! - `ai_brain_queue_wait_seconds` (histogram): time spent waiting for a slot
//! - `ai_brain_request_latency_seconds` (histogram): end-to-end latency
//!
//! # Design Decisions
//! - Components talk to a `MetricsRecorder` trait object, never to a backend
//! - `MetricsFacade` forwards to the `metrics` crate; `NoopMetrics` drops everything
//! - Prometheus exposition is behind the `prometheus` cargo feature

use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;
use crate::types::InferenceMode;

/// Sink for orchestrator measurements.
pub trait MetricsRecorder: Send + Sync {
    /// One attempt finished; `outcome` is `"success"` or an error kind.
    fn record_attempt(&self, outcome: &'static str);

    /// An `Invoke` call finished.
    fn record_request(&self, mode: InferenceMode, outcome: &'static str, latency: Duration);

    /// A failure of the given kind was observed.
    fn record_error(&self, kind: &'static str);

    /// The circuit breaker changed state.
    fn record_circuit_transition(&self, from: CircuitState, to: CircuitState);

    /// Current circuit state, published once when a breaker is created.
    fn record_circuit_state(&self, _state: CircuitState) {}

    /// Current number of queued and in-flight callers.
    fn record_queue_depth(&self, waiting: usize, in_flight: usize);

    /// How long a caller waited for a slot.
    fn record_queue_wait(&self, waited: Duration);
}

/// Forwards to the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsFacade;

impl MetricsRecorder for MetricsFacade {
    fn record_attempt(&self, outcome: &'static str) {
        metrics::counter!("ai_brain_attempts_total", "outcome" => outcome).increment(1);
    }

    fn record_request(&self, mode: InferenceMode, outcome: &'static str, latency: Duration) {
        let mode = mode.as_str();
        metrics::counter!("ai_brain_requests_total", "mode" => mode, "outcome" => outcome).increment(1);
        metrics::histogram!("ai_brain_request_latency_seconds", "mode" => mode, "outcome" => outcome)
            .record(latency.as_secs_f64());
    }

    fn record_error(&self, kind: &'static str) {
        metrics::counter!("ai_brain_errors_total", "kind" => kind).increment(1);
    }

    fn record_circuit_transition(&self, from: CircuitState, to: CircuitState) {
        metrics::counter!(
            "ai_brain_circuit_transitions_total",
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        self.record_circuit_state(to);
    }

    fn record_circuit_state(&self, state: CircuitState) {
        metrics::gauge!("ai_brain_circuit_state").set(state as u8 as f64);
    }

    fn record_queue_depth(&self, waiting: usize, in_flight: usize) {
        metrics::gauge!("ai_brain_queue_depth").set(waiting as f64);
        metrics::gauge!("ai_brain_in_flight").set(in_flight as f64);
    }

    fn record_queue_wait(&self, waited: Duration) {
        metrics::histogram!("ai_brain_queue_wait_seconds").record(waited.as_secs_f64());
    }
}

/// Discards every measurement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record_attempt(&self, _outcome: &'static str) {}
    fn record_request(&self, _mode: InferenceMode, _outcome: &'static str, _latency: Duration) {}
    fn record_error(&self, _kind: &'static str) {}
    fn record_circuit_transition(&self, _from: CircuitState, _to: CircuitState) {}
    fn record_queue_depth(&self, _waiting: usize, _in_flight: usize) {}
    fn record_queue_wait(&self, _waited: Duration) {}
}

/// Install the Prometheus exporter and its scrape listener.
///
/// Must be called from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(addr: SocketAddr) {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("ai_brain_request_latency_seconds".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 45.0],
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full("ai_brain_queue_wait_seconds".to_string()),
                &[0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0],
            )
        });

    match builder.and_then(|b| b.install()) {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(addr: SocketAddr) {
    tracing::warn!(address = %addr, "Built without the prometheus feature; metrics endpoint disabled");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_without_recorder_is_harmless() {
        // No global recorder installed: every call is a no-op in the metrics crate.
        let facade = MetricsFacade;
        facade.record_attempt("success");
        facade.record_request(InferenceMode::Parse, "success", Duration::from_millis(12));
        facade.record_circuit_state(CircuitState::Closed);
        facade.record_circuit_transition(CircuitState::Closed, CircuitState::Open);
        facade.record_queue_depth(3, 1);
    }

    #[test]
    fn test_recorder_is_object_safe() {
        let recorders: Vec<Box<dyn MetricsRecorder>> = vec![Box::new(MetricsFacade), Box::new(NoopMetrics)];
        for r in &recorders {
            r.record_error("timeout");
            r.record_queue_wait(Duration::from_millis(5));
        }
    }
}
