//! Chaining decorators onto a callable
//!
//! Each method wraps the callable and returns a new callable of the same
//! shape, so decorators stack in any order:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use decorum_common::resilience::RetryConfig;
//! use decorum_common::{CacheConfig, DecoratorError};
//! use decorum_core::Callable;
//!
//! # fn main() -> anyhow::Result<()> {
//! let lookup = Callable::<u32, String, DecoratorError>::new(|id| async move { Ok(format!("user-{id}")) })
//!     .timeout(Duration::from_secs(2))?
//!     .retry(RetryConfig::default())?
//!     .memoize(CacheConfig::lru(1000))?;
//! # let _ = lookup;
//! # Ok(())
//! # }
//! ```
//!
//! The first decorator applied is the innermost. Methods here discard the
//! decorator handle; build the decorator struct directly when its controls
//! (`cancel`, `reset`, `flush`, `clear`, `stats`) are needed.

use std::time::Duration;

use decorum_common::cache::CacheConfig;
use decorum_common::error::{ConfigResult, DecoratorError};
use decorum_common::resilience::{CircuitBreaker, RetryConfig};
use decorum_common::time::Clock;
use serde::Serialize;

use crate::callable::Callable;
use crate::config::Settings;
use crate::decorators::{
    Breaker, Debounce, DebounceConfig, Lock, Memoize, Repeat, Retry, Semaphore, Throttle,
    ThrottleConfig, Timeout,
};

impl<A, T, E> Callable<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Cache successful results keyed by serialized arguments
    pub fn memoize(self, config: CacheConfig) -> ConfigResult<Self>
    where
        A: Serialize,
        T: Clone + Sync,
    {
        Ok(Memoize::new(self, config)?.callable())
    }

    /// Retry failures with backoff
    pub fn retry(self, config: RetryConfig) -> ConfigResult<Self>
    where
        A: Clone,
    {
        Ok(Retry::new(self, config)?.callable())
    }

    /// Fail calls that take longer than `duration`
    pub fn timeout(self, duration: Duration) -> ConfigResult<Self> {
        Ok(Timeout::new(self, duration)?.callable())
    }

    /// Gate calls behind a (possibly shared) circuit breaker
    pub fn circuit_breaker<C: Clock>(self, breaker: &CircuitBreaker<C>) -> Self {
        Breaker::new(self, breaker.clone()).callable()
    }

    /// Collapse bursts of calls
    pub fn debounce(self, config: DebounceConfig) -> ConfigResult<Self>
    where
        T: Clone + Sync,
        E: Clone + Sync,
    {
        Ok(Debounce::new(self, config)?.callable())
    }

    /// Limit executions to one per window
    pub fn throttle(self, config: ThrottleConfig) -> ConfigResult<Self>
    where
        T: Clone,
        E: Clone,
    {
        Ok(Throttle::new(self, config)?.callable())
    }

    /// Run calls one at a time under `lock`
    pub fn locked(self, lock: &Lock) -> Self {
        lock.wrap(self)
    }

    /// Run at most `semaphore.max_concurrent()` calls at once
    pub fn limited(self, semaphore: &Semaphore) -> Self {
        semaphore.wrap(self)
    }

    /// Run the callable `times` times per call, returning the last value
    pub fn repeat(self, times: u32) -> Self
    where
        A: Clone,
    {
        Repeat::new(self, times).callable()
    }

    /// Apply the decorators configured in `settings`
    ///
    /// Order from innermost to outermost: timeout, retry, circuit breaker,
    /// throttle, debounce, semaphore, memoize. A cache hit therefore skips
    /// every other layer, and each retry attempt gets its own deadline.
    /// Batch settings do not apply to single-item callables and are ignored
    /// here.
    pub fn with_settings(self, settings: &Settings) -> ConfigResult<Self>
    where
        A: Serialize + Clone,
        T: Clone + Sync,
        E: Clone + Sync,
    {
        let mut callable = self;
        if let Some(timeout) = settings.timeout {
            callable = callable.timeout(timeout)?;
        }
        if let Some(retry) = &settings.retry {
            callable = callable.retry(retry.clone())?;
        }
        if let Some(breaker) = &settings.circuit_breaker {
            callable = callable.circuit_breaker(&CircuitBreaker::new(breaker.clone())?);
        }
        if let Some(throttle) = &settings.throttle {
            callable = callable.throttle(throttle.clone())?;
        }
        if let Some(debounce) = &settings.debounce {
            callable = callable.debounce(debounce.clone())?;
        }
        if let Some(semaphore) = settings.semaphore {
            callable = callable.limited(&Semaphore::new(semaphore.max_concurrent)?);
        }
        if let Some(memoize) = &settings.memoize {
            callable = callable.memoize(memoize.cache_config()?)?;
        }
        Ok(callable)
    }
}
