//! AI Brain request orchestrator.
//!
//! Governs every call from the application into a GPU-bound inference
//! backend: admission control, circuit breaking, escalating timeouts and
//! retries with jittered backoff.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod transport;
pub mod types;

pub use config::BrainConfig;
pub use error::{BuildError, OrchestratorError, OrchestratorResult, TransportError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::{AiBrainOrchestrator, OrchestratorSnapshot};
pub use transport::{LocalModel, ModelOutput, Transport};
pub use types::{InferenceMode, InferenceRequest, InferenceResponse};
