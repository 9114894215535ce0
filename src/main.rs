//! AI Brain orchestrator service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Business logic                     ┌──────────────────────────────────────┐
//!   ───────────── POST /v1/infer ─────▶│ http server (axum, x-request-id)     │
//!                                      └──────────────────┬───────────────────┘
//!                                                         ▼
//!                                      ┌──────────────────────────────────────┐
//!                                      │ AiBrainOrchestrator                  │
//!                                      │   circuit breaker → request queue    │
//!                                      │   → attempt timeout → retry/backoff  │
//!                                      └──────────────────┬───────────────────┘
//!                                                         ▼
//!                                      ┌──────────────────────────────────────┐
//!                                      │ transport: http (reqwest) | direct   │──▶ inference backend
//!                                      └──────────────────────────────────────┘
//! ```
//!
//! Direct mode needs a model loaded into the process, which only an
//! embedding application can provide; this binary serves http mode.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use ai_brain::config::loader::load_config;
use ai_brain::config::validation::validate_config;
use ai_brain::lifecycle::signals::shutdown_on_signal;
use ai_brain::observability::{logging, metrics};
use ai_brain::{AiBrainOrchestrator, BrainConfig, BuildError, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "ai-brain", version, about = "Resilient gateway to the AI Brain inference backend")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "AI_BRAIN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = BrainConfig::default();
            validate_config(&config).map_err(ai_brain::config::loader::ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ai-brain starting");
    tracing::info!(
        mode = ?config.backend.mode,
        backend = %config.backend.base_url,
        max_concurrency = config.queue.max_concurrency,
        failure_threshold = config.circuit_breaker.failure_threshold,
        max_attempts = config.retries.max_attempts,
        overall_deadline_ms = config.timeouts.overall_deadline_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = match AiBrainOrchestrator::from_config(&config, None) {
        Ok(o) => Arc::new(o),
        Err(BuildError::MissingModel) => {
            tracing::error!(
                "backend.mode = \"direct\" needs a model loaded in-process; \
                 embed the ai_brain library and pass a LocalModel instead"
            );
            return Err(BuildError::MissingModel.into());
        }
        Err(e) => return Err(e.into()),
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = Arc::new(Shutdown::new(orchestrator.clone()));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move { shutdown_on_signal(&signal_shutdown).await });

    HttpServer::new(orchestrator)
        .run(listener, shutdown.subscribe().recv())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
