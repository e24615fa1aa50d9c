//! Circuit breaker decorator
//!
//! Admission happens when the call is made, not when its future is first
//! polled, so a HalfOpen breaker hands out its trial slot to whichever call
//! arrives first. The breaker handle may be shared by several decorators.

use std::fmt;

use decorum_common::error::DecoratorError;
use decorum_common::resilience::{CircuitBreaker, CircuitState};
use decorum_common::time::{Clock, SystemClock};
use futures::future;
use tracing::debug;

use crate::callable::{CallFuture, Callable};

/// Decorator gating a callable behind a [`CircuitBreaker`]
pub struct Breaker<A, T, E, C: Clock = SystemClock> {
    inner: Callable<A, T, E>,
    breaker: CircuitBreaker<C>,
}

impl<A, T, E, C> Breaker<A, T, E, C>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
    C: Clock,
{
    /// Gate `inner` behind `breaker`
    pub fn new(inner: Callable<A, T, E>, breaker: CircuitBreaker<C>) -> Self {
        Self { inner, breaker }
    }

    /// Invoke through the breaker
    ///
    /// Rejected calls resolve to `CircuitOpen` without invoking the inner
    /// callable. Errors from the inner callable count as failures and are
    /// returned unchanged.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(error) => return Box::pin(future::ready(Err(E::from(error)))),
        };
        if permit.is_trial() {
            debug!("Running half-open trial call");
        }

        let pending = self.inner.call(args);
        Box::pin(async move {
            match pending.await {
                Ok(value) => {
                    permit.record_success();
                    Ok(value)
                }
                Err(error) => {
                    permit.record_failure();
                    Err(error)
                }
            }
        })
    }

    /// A callable that routes through the breaker
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }

    /// The shared breaker handle
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Current breaker state
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Force the breaker back to Closed
    pub fn reset(&self) {
        self.breaker.reset();
    }
}

impl<A, T, E, C: Clock> Clone for Breaker<A, T, E, C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), breaker: self.breaker.clone() }
    }
}

impl<A, T, E, C: Clock> fmt::Debug for Breaker<A, T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker").field("breaker", &self.breaker).finish_non_exhaustive()
    }
}
