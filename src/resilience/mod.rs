//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Invoke attempt:
//!     → circuit_breaker.rs (admit, or reject while the backend is unhealthy)
//!     → queue.rs (wait for one of max_concurrency slots)
//!     → timeouts.rs (bound the attempt by escalating timeout and overall deadline)
//!     → On failure: retries.rs + backoff.rs (sleep, then try again)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; the caller can only shorten it
//! - Breaker and queue reject fast instead of stacking work on a sick backend
//! - Backoff math is pure so it can be tested without a clock

pub mod backoff;
pub mod circuit_breaker;
pub mod queue;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitPermit, CircuitSnapshot, CircuitState};
pub use queue::{QueueSlot, QueueStats, RequestQueue};
pub use retries::RetryPolicy;
pub use timeouts::{Deadline, TimeoutStrategy};
