//! # Turnstile Infrastructure
//!
//! Concrete implementations of the ports defined in `turnstile-core`,
//! plus environment-driven configuration and tracing setup.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - Redis-backed attempt store
//! - `minimal` - No external services, in-memory store only

pub mod clock;
pub mod config;
pub mod storage;
pub mod telemetry;

// Re-exports - In-Memory
pub use clock::{ManualClock, SystemClock};
pub use config::limiter_options_from_env;
pub use storage::InMemoryAttemptStore;
pub use telemetry::{TelemetryConfig, init_telemetry};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use storage::{RedisAttemptStore, RedisConfig, connect_store};
