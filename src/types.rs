//! Request and response types for inference calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// What the caller wants the model to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Parse a transaction description into structured fields.
    Parse,
    /// Answer a free-form chat query.
    Chat,
    /// Analyze a batch of transactions.
    Analyze,
}

impl InferenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceMode::Parse => "parse",
            InferenceMode::Chat => "chat",
            InferenceMode::Analyze => "analyze",
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inference call, created by the caller and discarded afterwards.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub mode: InferenceMode,
    /// Opaque text or context blob forwarded to the backend.
    pub payload: String,
    /// Caps total wall time; the shorter of this and the configured
    /// overall deadline wins.
    pub caller_deadline: Option<Duration>,
}

impl InferenceRequest {
    pub fn new(mode: InferenceMode, payload: impl Into<String>) -> Self {
        Self {
            mode,
            payload: payload.into(),
            caller_deadline: None,
        }
    }

    pub fn parse(payload: impl Into<String>) -> Self {
        Self::new(InferenceMode::Parse, payload)
    }

    pub fn chat(payload: impl Into<String>) -> Self {
        Self::new(InferenceMode::Chat, payload)
    }

    pub fn analyze(payload: impl Into<String>) -> Self {
        Self::new(InferenceMode::Analyze, payload)
    }

    /// Bound the total time this request may take.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.caller_deadline = Some(deadline);
        self
    }
}

/// Result of a successful inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub mode: InferenceMode,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Map<String, Value>>,
    /// Backend confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Number of attempts including the successful one.
    pub attempts_used: u32,
    /// True when the backend served the call from a non-primary path.
    pub degraded: bool,
}
