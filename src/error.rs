//! Error taxonomy for orchestrated inference calls.
//!
//! # Propagation
//! ```text
//! TransportError      → retried inside Invoke up to max_attempts
//! CircuitOpen         → returned immediately, never retried
//! QueueTimeout        → returned immediately, never retried
//! DeadlineExceeded    → terminal, returned regardless of remaining attempts
//! RetriesExhausted    → wraps the last TransportError
//! ```

use std::time::Duration;
use thiserror::Error;

/// Failure of a single attempt against the inference backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The attempt did not finish within its per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The backend answered with a non-2xx status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered but the payload was unusable.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The in-process model returned an error or panicked.
    #[error("local model failed: {0}")]
    Model(String),

    /// Any other HTTP client failure.
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connect(_) => "connect",
            TransportError::Status { .. } => "status",
            TransportError::Malformed(_) => "malformed",
            TransportError::Model(_) => "model",
            TransportError::Request(_) => "request",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        classify_reqwest(err.is_timeout(), err.is_connect(), err.is_decode(), err.to_string())
    }
}

// Attempt timeouts are enforced by the orchestrator; a timeout reported by
// reqwest itself can only come from the client's own limits.
fn classify_reqwest(timeout: bool, connect: bool, decode: bool, message: String) -> TransportError {
    match (timeout, connect) {
        (true, true) => TransportError::Connect(format!(
            "connect timed out after {:?}: {message}",
            crate::transport::http::CONNECT_TIMEOUT
        )),
        (true, false) => TransportError::Request(format!("client timed out: {message}")),
        (false, true) => TransportError::Connect(message),
        (false, false) if decode => TransportError::Malformed(message),
        (false, false) => TransportError::Request(message),
    }
}

/// Errors surfaced to callers of [`crate::AiBrainOrchestrator::invoke`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Backend presumed unhealthy; no call was made.
    #[error("circuit breaker is open (retry after {retry_after:?})")]
    CircuitOpen { retry_after: Duration },

    /// No concurrency slot became free in time.
    #[error("no inference slot available after waiting {waited:?}")]
    QueueTimeout { waited: Duration },

    /// The overall request deadline ran out.
    #[error("deadline exceeded after {attempts} attempt(s) and {elapsed:?}")]
    DeadlineExceeded { attempts: u32, elapsed: Duration },

    /// Every allowed attempt failed.
    #[error("all {attempts} attempt(s) failed, last error: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The orchestrator is shutting down and admits no new work.
    #[error("orchestrator is shutting down")]
    ShuttingDown,
}

impl OrchestratorError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::CircuitOpen { .. } => "circuit_open",
            OrchestratorError::QueueTimeout { .. } => "queue_timeout",
            OrchestratorError::DeadlineExceeded { .. } => "deadline_exceeded",
            OrchestratorError::RetriesExhausted { .. } => "retries_exhausted",
            OrchestratorError::ShuttingDown => "shutting_down",
        }
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Failure to assemble an orchestrator from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid backend url: {0}")]
    BackendUrl(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("direct transport mode requires a local model")]
    MissingModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::QueueTimeout {
            waited: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "no inference slot available after waiting 250ms");

        let err = OrchestratorError::RetriesExhausted {
            attempts: 3,
            source: TransportError::Status {
                status: 503,
                body: "busy".into(),
            },
        };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.kind(), "retries_exhausted");
    }

    #[test]
    fn test_transport_kinds() {
        assert_eq!(TransportError::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(TransportError::Malformed("x".into()).kind(), "malformed");
        assert_eq!(TransportError::Model("x".into()).kind(), "model");
    }

    #[test]
    fn test_reqwest_timeouts_never_report_zero() {
        let err = classify_reqwest(true, true, false, "operation timed out".into());
        assert_eq!(err.kind(), "connect");
        assert!(err.to_string().contains("5s"), "{err}");
        assert!(!err.to_string().contains("0ns"));

        let err = classify_reqwest(true, false, false, "operation timed out".into());
        assert_eq!(err.kind(), "request");
        assert!(!err.to_string().contains("0ns"), "{err}");

        assert_eq!(classify_reqwest(false, true, false, "refused".into()).kind(), "connect");
        assert_eq!(classify_reqwest(false, false, true, "bad json".into()).kind(), "malformed");
    }
}
