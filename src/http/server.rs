//! HTTP server exposing the orchestrator.
//!
//! # Responsibilities
//! - Build the axum router and its middleware (tracing, request ids)
//! - Translate JSON bodies into `InferenceRequest`s
//! - Map orchestrator errors onto status codes callers can act on
//! - Serve until the shutdown future resolves
//!
//! # Status Mapping
//! ```text
//! CircuitOpen       → 503 + Retry-After
//! QueueTimeout      → 429
//! DeadlineExceeded  → 504
//! RetriesExhausted  → 502
//! ShuttingDown      → 503
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::OrchestratorError;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::orchestrator::{AiBrainOrchestrator, OrchestratorSnapshot};
use crate::types::{InferenceMode, InferenceRequest, InferenceResponse};

/// Body of `POST /v1/infer`.
#[derive(Debug, Clone, Deserialize)]
pub struct InferBody {
    pub mode: InferenceMode,
    pub payload: String,
    #[serde(default)]
    pub caller_deadline_ms: Option<u64>,
}

impl From<InferBody> for InferenceRequest {
    fn from(body: InferBody) -> Self {
        let request = InferenceRequest::new(body.mode, body.payload);
        match body.caller_deadline_ms {
            Some(ms) => request.with_deadline(Duration::from_millis(ms)),
            None => request,
        }
    }
}

/// An orchestrator error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            OrchestratorError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::QueueTimeout { .. } => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            OrchestratorError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            OrchestratorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));
        let mut response = (self.status(), body).into_response();

        if let OrchestratorError::CircuitOpen { retry_after } = &self.0 {
            // Whole seconds, never zero: a half-open probe resolves quickly but not instantly.
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// HTTP front end for one orchestrator instance.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(orchestrator: Arc<AiBrainOrchestrator>) -> Self {
        Self {
            router: Self::build_router(orchestrator),
        }
    }

    fn build_router(orchestrator: Arc<AiBrainOrchestrator>) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "http",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %req.headers().request_id(),
            )
        });

        Router::new()
            .route("/v1/infer", post(infer_handler))
            .route("/health", get(health_handler))
            .with_state(orchestrator)
            .layer(trace)
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The router, for embedding into a larger application.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain open requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn infer_handler(
    State(orchestrator): State<Arc<AiBrainOrchestrator>>,
    headers: HeaderMap,
    Json(body): Json<InferBody>,
) -> Result<Json<InferenceResponse>, ApiError> {
    tracing::debug!(
        request_id = %headers.request_id(),
        mode = %body.mode,
        payload_len = body.payload.len(),
        "Inference request received"
    );

    orchestrator
        .invoke(body.into())
        .await
        .map(Json)
        .map_err(ApiError)
}

async fn health_handler(
    State(orchestrator): State<Arc<AiBrainOrchestrator>>,
) -> (StatusCode, Json<OrchestratorSnapshot>) {
    let snapshot = orchestrator.snapshot();
    let status = if snapshot.shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(snapshot))
}
