//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator, breaker and queue produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via MetricsRecorder)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of an invocation
//! - Metrics are cheap (atomic increments in the metrics crate)

pub mod logging;
pub mod metrics;

pub use self::metrics::{MetricsFacade, MetricsRecorder, NoopMetrics};
