//! Shared utilities for integration tests.
#![allow(dead_code)]

use ai_brain::config::BrainConfig;
use ai_brain::observability::MetricsRecorder;
use ai_brain::resilience::CircuitState;
use ai_brain::transport::{LocalModel, ModelError, ModelOutput};
use ai_brain::InferenceMode;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// A running mock inference server.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicU32>,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

type Reply = Pin<Box<dyn Future<Output = (u16, String)> + Send>>;
type Handler = dyn Fn(u32, Value) -> Reply + Send + Sync;

#[derive(Clone)]
struct MockState {
    calls: Arc<AtomicU32>,
    handler: Arc<Handler>,
}

async fn mock_infer(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let n = state.calls.fetch_add(1, Ordering::SeqCst);
    let (status, body) = (state.handler)(n, body).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Start a programmable inference backend on an ephemeral port.
///
/// `f` receives the zero-based call number and the JSON request body and
/// returns the status code and raw response body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(u32, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let calls = Arc::new(AtomicU32::new(0));
    let state = MockState {
        calls: calls.clone(),
        handler: Arc::new(move |n: u32, body: Value| -> Reply { Box::pin(f(n, body)) }),
    };
    let app = Router::new().route("/v1/infer", post(mock_infer)).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, calls }
}

/// A well-formed backend answer.
pub fn ok_body(raw_text: &str, confidence: f64) -> String {
    serde_json::json!({ "raw_text": raw_text, "confidence": confidence }).to_string()
}

/// Config with short delays so tests finish quickly.
pub fn fast_config(base_url: &str) -> BrainConfig {
    let mut config = BrainConfig::default();
    config.backend.base_url = base_url.to_string();
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config.timeouts.base_timeout_ms = 2_000;
    config.timeouts.overall_deadline_ms = 10_000;
    config
}

/// A local model that replays a script of outcomes, then keeps answering.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Step>>,
    pub calls: AtomicU32,
}

pub enum Step {
    Answer(ModelOutput),
    Fail(&'static str),
    Panic,
    Sleep(Duration),
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocalModel for ScriptedModel {
    fn generate(&self, mode: InferenceMode, payload: &str) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Answer(out)) => Ok(out),
            Some(Step::Fail(msg)) => Err(msg.into()),
            Some(Step::Panic) => panic!("scripted panic"),
            Some(Step::Sleep(d)) => {
                std::thread::sleep(d);
                Ok(ModelOutput::text(format!("{mode} after sleep"), 0.5))
            }
            None => Ok(ModelOutput::text(format!("{mode}: {payload}"), 0.9)),
        }
    }
}

/// Records every measurement for later assertions.
#[derive(Default)]
pub struct RecordingMetrics {
    pub attempts: Mutex<Vec<&'static str>>,
    pub requests: Mutex<Vec<(InferenceMode, &'static str)>>,
    pub errors: Mutex<Vec<&'static str>>,
    pub transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
    pub max_in_flight: AtomicU32,
}

impl RecordingMetrics {
    pub fn attempts(&self) -> Vec<&'static str> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn transitions(&self) -> Vec<(CircuitState, CircuitState)> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<(InferenceMode, &'static str)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn record_attempt(&self, outcome: &'static str) {
        self.attempts.lock().unwrap().push(outcome);
    }

    fn record_request(&self, mode: InferenceMode, outcome: &'static str, _latency: Duration) {
        self.requests.lock().unwrap().push((mode, outcome));
    }

    fn record_error(&self, kind: &'static str) {
        self.errors.lock().unwrap().push(kind);
    }

    fn record_circuit_transition(&self, from: CircuitState, to: CircuitState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn record_queue_depth(&self, _waiting: usize, in_flight: usize) {
        self.max_in_flight.fetch_max(in_flight as u32, Ordering::SeqCst);
    }

    fn record_queue_wait(&self, _waited: Duration) {}
}
