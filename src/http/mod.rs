//! HTTP service subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (stamp / propagate x-request-id)
//!     → server.rs (axum routes)
//!         POST /v1/infer → AiBrainOrchestrator::invoke
//!         GET  /health   → AiBrainOrchestrator::snapshot
//!     → JSON response, errors mapped to status codes
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
