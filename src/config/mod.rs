//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BrainConfig (validated, immutable)
//!     → consumed once when the orchestrator is constructed
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BrainConfig;
pub use schema::BackendConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::HalfOpenPolicy;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::QueueConfig;
pub use schema::RetryConfig;
pub use schema::TimeoutConfig;
pub use schema::TransportMode;
