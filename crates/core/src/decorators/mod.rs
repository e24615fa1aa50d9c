//! Decorators
//!
//! Each decorator wraps a [`Callable`](crate::Callable) and exposes
//! `call(args)` plus `callable()` for a same-shaped callable that can be
//! wrapped again. Decorators that keep state hold it in one
//! `Arc<Mutex<_>>` per instance; clones of a decorator share it.
//!
//! | Decorator | State | Errors it adds |
//! |-----------|-------|----------------|
//! | [`Memoize`] | cache | none |
//! | [`Retry`] | none (per call) | none |
//! | [`Breaker`] | shared circuit breaker | `CircuitOpen` |
//! | [`Debounce`] | window, timer, waiters | `Cancelled` |
//! | [`Throttle`] | window, timer, waiters | `Throttled`, `Cancelled` |
//! | [`Batch`] | buffer, timer, waiters | `Cancelled` |
//! | [`Lock`] / [`Semaphore`] | permit count, waiter queue | `Cancelled` |
//! | [`Race`] / [`All`] | none | `Aggregate` |
//! | [`Timeout`] | none | `Timeout` |
//! | [`Validate`] / [`Switch`] / [`Repeat`] | none | `ValidationFailed`, `SwitchNoMatch`, `StateViolation` |

pub mod batch;
pub mod circuit_breaker;
pub mod combinators;
pub mod concurrency;
pub mod control;
pub mod debounce;
pub mod memoize;
pub mod retry;
pub mod throttle;
pub mod timeout;

use decorum_common::error::DecoratorError;
use tokio::sync::oneshot;

pub use self::batch::{Batch, BatchConfig, BatchExecutor};
pub use self::circuit_breaker::Breaker;
pub use self::combinators::{All, CompleteObserver, LoseObserver, Race, WinObserver};
pub use self::concurrency::{Lock, Semaphore};
pub use self::control::{IterationObserver, Repeat, Selector, Switch, Validate, Validator};
pub use self::debounce::{Debounce, DebounceConfig, DebounceMode};
pub use self::memoize::{KeyFn, Memoize};
pub use self::retry::{Retry, RetryObserver, RetryPredicate};
pub use self::throttle::{Throttle, ThrottleConfig, ThrottleMode};
pub use self::timeout::Timeout;
use crate::callable::CallFuture;

/// Sending half held by a decorator for a caller collapsed into a shared run
pub(crate) type Waiter<T, E> = oneshot::Sender<Result<T, E>>;

/// Create a waiter and the future its caller awaits
///
/// If the waiter is dropped without a result (cancel, reset, runtime
/// shutdown) the caller resolves to `Cancelled`.
pub(crate) fn receive<T, E>() -> (Waiter<T, E>, CallFuture<T, E>)
where
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    let (waiter, outcome) = oneshot::channel();
    let outcome: CallFuture<T, E> = Box::pin(async move {
        outcome.await.unwrap_or_else(|_| Err(E::from(DecoratorError::Cancelled)))
    });
    (waiter, outcome)
}

/// Hand one shared outcome to every collapsed caller
pub(crate) fn deliver<T: Clone, E: Clone>(waiters: Vec<Waiter<T, E>>, result: Result<T, E>) {
    for waiter in waiters {
        // A caller that dropped its future no longer wants the result
        let _ = waiter.send(result.clone());
    }
}
