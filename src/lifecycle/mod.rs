//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → orchestrator stops admitting → server stops accepting
//!             → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - The orchestrator is closed before the listener so queued callers
//!   get a definite `ShuttingDown` instead of hanging on a dead socket

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
