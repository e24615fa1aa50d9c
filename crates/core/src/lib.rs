//! # Decorum Core
//!
//! Composable decorators for asynchronous callables.
//!
//! This crate contains:
//! - [`Callable`]: a uniform handle over async functions of 0, 1 or 2
//!   arguments
//! - [`decorators`]: memoize, retry, circuit breaker, debounce, throttle,
//!   batch, lock, semaphore, race, all, timeout, validate, switch, repeat
//! - [`pipeline`]: chaining methods on `Callable`
//! - [`config`]: decorator settings loaded from TOML or JSON
//!
//! ## Architecture Principles
//! - State machines and data structures live in `decorum-common`
//! - Decorators own state *about* a callable, never the callable itself
//! - State transitions happen under a synchronous lock that is never held
//!   across an `.await`
//! - Timers and background work run on the ambient tokio runtime

pub mod callable;
pub mod config;
pub mod decorators;
pub mod pipeline;

pub use callable::{CallFuture, Callable};
pub use config::{MemoizeSettings, SemaphoreSettings, Settings};
pub use decorators::{
    All, Batch, BatchConfig, Breaker, Debounce, DebounceConfig, DebounceMode, Lock, Memoize, Race,
    Repeat, Retry, Semaphore, Switch, Throttle, ThrottleConfig, ThrottleMode, Timeout, Validate,
};
// Re-export the shared primitives callers configure decorators with
pub use decorum_common::{
    BackoffStrategy, CacheConfig, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    ConfigError, ConfigResult, DecoratorError, EvictionPolicy, Jitter, RetryConfig,
};
