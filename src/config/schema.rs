//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the AI Brain orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BrainConfig {
    /// Inference backend and transport selection.
    pub backend: BackendConfig,

    /// Admission control (bounded concurrency + wait queue).
    pub queue: QueueConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Service listener settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How attempts reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// JSON POST to a remote inference server.
    #[default]
    Http,
    /// Direct call into a locally loaded model.
    Direct,
}

/// Inference backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Transport used for every attempt.
    pub mode: TransportMode,

    /// Base URL of the inference server (http mode only).
    pub base_url: String,

    /// Path appended to `base_url` for inference calls.
    pub infer_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Http,
            base_url: "http://127.0.0.1:8000".to_string(),
            infer_path: "/v1/infer".to_string(),
        }
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum simultaneous backend calls.
    pub max_concurrency: usize,

    /// Longest a caller may wait for a slot, in milliseconds.
    pub queue_wait_timeout_ms: u64,
}

impl QueueConfig {
    pub fn queue_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_wait_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            queue_wait_timeout_ms: 2_000,
        }
    }
}

/// What non-probe callers do while a half-open probe is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenPolicy {
    /// Reject immediately with a circuit-open error.
    #[default]
    FailFast,
    /// Wait (bounded by the caller's deadline) for the probe to resolve.
    Wait,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before probing, in seconds.
    pub open_duration_secs: u64,

    /// Behaviour of concurrent callers during the half-open probe.
    pub half_open_policy: HalfOpenPolicy,
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_secs: 30,
            half_open_policy: HalfOpenPolicy::FailFast,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor applied per retry.
    pub multiplier: f64,

    /// Upper bound on a single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of the delay used as +/- jitter (0.0 - 1.0).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 2_000,
            jitter_fraction: 0.1,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout of the first attempt in milliseconds.
    pub base_timeout_ms: u64,

    /// Growth factor applied per attempt.
    pub escalation_factor: f64,

    /// Upper bound on a single attempt in milliseconds.
    pub max_timeout_ms: u64,

    /// Ceiling on total wall time per request in milliseconds.
    pub overall_deadline_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_timeout_ms: 5_000,
            escalation_factor: 1.5,
            max_timeout_ms: 20_000,
            overall_deadline_ms: 45_000,
        }
    }
}

/// Service listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "127.0.0.1:9095".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: BrainConfig = toml::from_str(
            r#"
            [queue]
            max_concurrency = 1

            [circuit_breaker]
            half_open_policy = "wait"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.max_concurrency, 1);
        assert_eq!(config.queue.queue_wait_timeout_ms, 2_000);
        assert_eq!(config.circuit_breaker.half_open_policy, HalfOpenPolicy::Wait);
        assert_eq!(config.backend.mode, TransportMode::Http);
        assert_eq!(config.retries.max_attempts, 3);
    }

    #[test]
    fn test_direct_mode_parses() {
        let config: BrainConfig = toml::from_str("[backend]\nmode = \"direct\"\n").unwrap();
        assert_eq!(config.backend.mode, TransportMode::Direct);
        assert_eq!(config.circuit_breaker.open_duration(), Duration::from_secs(30));
    }
}
