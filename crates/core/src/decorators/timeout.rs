//! Timeout decorator
//!
//! The usual outer guard for lock and semaphore waits, which never time out
//! on their own. A timed-out inner future is dropped.

use std::fmt;
use std::time::Duration;

use decorum_common::error::{ConfigError, ConfigResult, DecoratorError};
use tracing::warn;

use crate::callable::{CallFuture, Callable};

/// Fails calls that do not settle within a fixed duration
pub struct Timeout<A, T, E> {
    inner: Callable<A, T, E>,
    duration: Duration,
}

impl<A, T, E> Timeout<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Bound `inner` by `duration`
    pub fn new(inner: Callable<A, T, E>, duration: Duration) -> ConfigResult<Self> {
        if duration.is_zero() {
            return Err(ConfigError::invalid("timeout must be greater than 0"));
        }
        Ok(Self { inner, duration })
    }

    /// Invoke with a deadline
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let pending = self.inner.call(args);
        let duration = self.duration;
        Box::pin(async move {
            match tokio::time::timeout(duration, pending).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = duration.as_millis() as u64, "Call timed out");
                    Err(E::from(DecoratorError::Timeout { timeout: duration }))
                }
            }
        })
    }

    /// A callable that routes through this decorator
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }
}

impl<A, T, E> Clone for Timeout<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), duration: self.duration }
    }
}

impl<A, T, E> fmt::Debug for Timeout<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout").field("duration", &self.duration).finish_non_exhaustive()
    }
}
