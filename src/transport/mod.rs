//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator attempt (bounded by the attempt timeout, holding a queue slot)
//!     → Transport::call
//!         - http.rs   (JSON POST to the inference server)
//!         - direct.rs (LocalModel on the blocking pool)
//!     → wire.rs (decode + validate)
//!     → ModelOutput | TransportError
//! ```
//!
//! # Design Decisions
//! - Mode is fixed at construction; dispatch is a plain enum match
//! - Both transports apply the same output validation
//! - The queue slot travels with the call: an abandoned HTTP request frees it
//!   at once, an abandoned model call frees it when the model returns

pub mod direct;
pub mod http;
pub mod wire;

use std::sync::Arc;

use crate::config::{BackendConfig, TransportMode};
use crate::error::{BuildError, TransportError};
use crate::resilience::QueueSlot;
use crate::types::InferenceMode;

pub use direct::{model_fn, DirectTransport, LocalModel, ModelError};
pub use http::HttpTransport;
pub use wire::ModelOutput;

#[derive(Debug, Clone)]
pub enum Transport {
    Http(HttpTransport),
    Direct(DirectTransport),
}

impl Transport {
    /// Build the transport selected by `config.mode`.
    ///
    /// Direct mode needs the loaded model; it is ignored in http mode.
    pub fn from_config(
        config: &BackendConfig,
        model: Option<Arc<dyn LocalModel>>,
    ) -> Result<Self, BuildError> {
        match config.mode {
            TransportMode::Http => Ok(Transport::Http(HttpTransport::new(config)?)),
            TransportMode::Direct => model
                .map(|m| Transport::Direct(DirectTransport::new(m)))
                .ok_or(BuildError::MissingModel),
        }
    }

    pub fn direct(model: Arc<dyn LocalModel>) -> Self {
        Transport::Direct(DirectTransport::new(model))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::Http(_) => "http",
            Transport::Direct(_) => "direct",
        }
    }

    /// Run one attempt while `slot` is held.
    pub async fn call(
        &self,
        mode: InferenceMode,
        payload: &str,
        slot: QueueSlot,
    ) -> Result<ModelOutput, TransportError> {
        match self {
            Transport::Http(t) => {
                let result = t.call(mode, payload).await;
                drop(slot);
                result
            }
            Transport::Direct(t) => t.call(mode, payload, slot).await,
        }
    }
}
