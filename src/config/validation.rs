//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (counts > 0, factors >= 1, fractions in [0, 1])
//! - Check the backend URL when the HTTP transport is selected
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BrainConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{BrainConfig, TransportMode};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at least 1.0 (got {value})")]
    FactorBelowOne { field: &'static str, value: f64 },

    #[error("jitter_fraction must be within [0, 1] (got {0})")]
    JitterOutOfRange(f64),

    #[error("{lower} ({lower_ms}ms) exceeds {upper} ({upper_ms}ms)")]
    Inverted {
        lower: &'static str,
        lower_ms: u64,
        upper: &'static str,
        upper_ms: u64,
    },

    #[error("invalid backend url '{url}': {reason}")]
    BackendUrl { url: String, reason: String },
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &BrainConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.queue.max_concurrency == 0 {
        errors.push(ValidationError::Zero { field: "queue.max_concurrency" });
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::Zero { field: "retries.max_attempts" });
    }
    if !(retries.multiplier >= 1.0) {
        errors.push(ValidationError::FactorBelowOne {
            field: "retries.multiplier",
            value: retries.multiplier,
        });
    }
    if !(0.0..=1.0).contains(&retries.jitter_fraction) {
        errors.push(ValidationError::JitterOutOfRange(retries.jitter_fraction));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::Inverted {
            lower: "retries.base_delay_ms",
            lower_ms: retries.base_delay_ms,
            upper: "retries.max_delay_ms",
            upper_ms: retries.max_delay_ms,
        });
    }

    let timeouts = &config.timeouts;
    if timeouts.base_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.base_timeout_ms" });
    }
    if timeouts.overall_deadline_ms == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.overall_deadline_ms" });
    }
    if !(timeouts.escalation_factor >= 1.0) {
        errors.push(ValidationError::FactorBelowOne {
            field: "timeouts.escalation_factor",
            value: timeouts.escalation_factor,
        });
    }
    if timeouts.base_timeout_ms > timeouts.max_timeout_ms {
        errors.push(ValidationError::Inverted {
            lower: "timeouts.base_timeout_ms",
            lower_ms: timeouts.base_timeout_ms,
            upper: "timeouts.max_timeout_ms",
            upper_ms: timeouts.max_timeout_ms,
        });
    }

    if config.backend.mode == TransportMode::Http {
        match Url::parse(&config.backend.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::BackendUrl {
                url: config.backend.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::BackendUrl {
                url: config.backend.base_url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
