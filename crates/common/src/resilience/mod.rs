//! Resilience primitives shared by the decorators
//!
//! - **Circuit Breaker**: failure-count state machine gating calls
//! - **Backoff**: pure delay strategies plus jitter
//! - **Retry**: attempt budget and delay policy for the retry decorator
//!
//! Everything here is synchronous state; the async wrappers that drive these
//! primitives around a callable live in `decorum-core`.

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;

pub use backoff::{BackoffStrategy, Jitter};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitPermit, CircuitState, StateObserver,
};
pub use retry::{RetryConfig, RetryConfigBuilder};
