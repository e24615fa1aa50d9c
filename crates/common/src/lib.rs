//! Shared primitives for the Decorum decorator engine.
//!
//! This crate holds the state machines and data structures that decorators
//! are built from, independent of any particular callable shape:
//! - [`error`]: the decorator error taxonomy and configuration errors
//! - [`time`]: clock abstraction (system, mock, tokio-driven)
//! - [`cache`]: bounded key/value store with LRU/LFU/FIFO/TTL eviction
//! - [`resilience`]: circuit breaker state machine and backoff strategies
//! - [`utils`]: serde helpers shared by configuration types
//!
//! # Feature Tiers
//!
//! - `runtime` (default): tokio-backed clock and cancellable timers
//! - `test-utils`: async assertions and tracing setup for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod error;
pub mod resilience;
pub mod time;
pub mod utils;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use cache::{derive_key, Cache, CacheConfig, CacheConfigBuilder, CacheStats, EvictionPolicy};
pub use error::{
    ConfigError, ConfigResult, DecoratorError, ErrorClassification, ErrorSeverity,
};
pub use resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitPermit, CircuitState, Jitter, RetryConfig, RetryConfigBuilder,
    StateObserver,
};
#[cfg(feature = "runtime")]
pub use time::{TimerHandle, TokioClock};
pub use time::{Clock, MockClock, SystemClock};
pub use utils::serde::{duration_millis, option_duration_millis};
