//! In-process transport: a direct call into a locally loaded model.
//!
//! Model calls are GPU/CPU bound and synchronous, so they run on Tokio's
//! blocking pool. A timed-out call stops being awaited but the blocking
//! thread finishes its work in the background, still holding whatever
//! guard the caller handed in (the concurrency slot).

use std::sync::Arc;

use crate::error::TransportError;
use crate::transport::wire::{validate_output, ModelOutput};
use crate::types::InferenceMode;

/// Error type returned by a local model.
pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// A model loaded into this process.
pub trait LocalModel: Send + Sync + 'static {
    fn generate(&self, mode: InferenceMode, payload: &str) -> Result<ModelOutput, ModelError>;
}

impl<F> LocalModel for F
where
    F: Fn(InferenceMode, &str) -> Result<ModelOutput, ModelError> + Send + Sync + 'static,
{
    fn generate(&self, mode: InferenceMode, payload: &str) -> Result<ModelOutput, ModelError> {
        self(mode, payload)
    }
}

/// Wrap a closure as a shareable [`LocalModel`].
pub fn model_fn<F>(f: F) -> Arc<dyn LocalModel>
where
    F: Fn(InferenceMode, &str) -> Result<ModelOutput, ModelError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct DirectTransport {
    model: Arc<dyn LocalModel>,
}

impl DirectTransport {
    pub fn new(model: Arc<dyn LocalModel>) -> Self {
        Self { model }
    }

    /// Run the model on the blocking pool. `held` is dropped only when the
    /// model returns, even if this future is dropped first.
    pub async fn call<G>(&self, mode: InferenceMode, payload: &str, held: G) -> Result<ModelOutput, TransportError>
    where
        G: Send + 'static,
    {
        let model = self.model.clone();
        let payload = payload.to_owned();

        let output = tokio::task::spawn_blocking(move || {
            let _held = held;
            model.generate(mode, &payload)
        })
            .await
            .map_err(|join_err| {
                if join_err.is_panic() {
                    TransportError::Model("local model panicked".to_string())
                } else {
                    TransportError::Model("local model task cancelled".to_string())
                }
            })?
            .map_err(|e| TransportError::Model(e.to_string()))?;

        validate_output(mode, output)
    }
}

impl std::fmt::Debug for DirectTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectTransport").finish_non_exhaustive()
    }
}
