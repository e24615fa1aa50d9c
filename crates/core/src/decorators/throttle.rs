//! Throttle: at most one execution per window
//!
//! - `leading`: the first call of a window runs; later calls in the window
//!   fail at once with `Throttled { remaining }`.
//! - `trailing`: the first call opens a window without running. When the
//!   window ends the last call's arguments run once and every caller of the
//!   window receives that result.
//! - `both`: the first call runs at once. If more calls arrive in the window
//!   they share one trailing run at window end, which opens a fresh window.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use decorum_common::error::{ConfigError, ConfigResult, DecoratorError};
use decorum_common::time::TimerHandle;
use decorum_common::{duration_millis, impl_mode_conversions};
use futures::future;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{deliver, receive, Waiter};
use crate::callable::{CallFuture, Callable};

/// Which edge of a window executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleMode {
    /// Run the first call, reject the rest of the window
    #[default]
    Leading,
    /// Run the last call of the window when it ends
    Trailing,
    /// Run the first call, and the last one too if the window saw more
    Both,
}

impl_mode_conversions!(ThrottleMode {
    Leading => "leading",
    Trailing => "trailing",
    Both => "both",
});

/// Throttle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Window length
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    /// Edge that executes
    #[serde(default)]
    pub mode: ThrottleMode,
}

impl ThrottleConfig {
    /// Leading-edge throttle
    pub fn leading(interval: Duration) -> Self {
        Self { interval, mode: ThrottleMode::Leading }
    }

    /// Trailing-edge throttle
    pub fn trailing(interval: Duration) -> Self {
        Self { interval, mode: ThrottleMode::Trailing }
    }

    /// Leading and trailing throttle
    pub fn both(interval: Duration) -> Self {
        Self { interval, mode: ThrottleMode::Both }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid("throttle interval must be greater than 0"));
        }
        Ok(())
    }
}

struct ThrottleState<A, T, E> {
    generation: u64,
    /// End of the active window, if any
    window_end: Option<Instant>,
    timer: Option<TimerHandle>,
    trailing_args: Option<A>,
    waiters: Vec<Waiter<T, E>>,
}

impl<A, T, E> ThrottleState<A, T, E> {
    fn new() -> Self {
        Self { generation: 0, window_end: None, timer: None, trailing_args: None, waiters: Vec::new() }
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.window_end.filter(|end| *end > now).map(|end| end - now)
    }
}

/// Throttling decorator
///
/// Clones share the same window.
pub struct Throttle<A, T, E> {
    inner: Callable<A, T, E>,
    config: ThrottleConfig,
    state: Arc<Mutex<ThrottleState<A, T, E>>>,
}

impl<A, T, E> Throttle<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: From<DecoratorError> + Clone + Send + 'static,
{
    /// Throttle `inner`
    pub fn new(inner: Callable<A, T, E>, config: ThrottleConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { inner, config, state: Arc::new(Mutex::new(ThrottleState::new())) })
    }

    /// Register a call
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let remaining = state.remaining(now);

        match (self.config.mode, remaining) {
            (ThrottleMode::Leading, Some(remaining)) => {
                debug!(remaining_ms = remaining.as_millis() as u64, "Call throttled");
                Box::pin(future::ready(Err(E::from(DecoratorError::Throttled { remaining }))))
            }
            (ThrottleMode::Leading, None) => {
                state.window_end = Some(now + self.config.interval);
                self.inner.call(args)
            }
            (ThrottleMode::Trailing, None) => {
                self.open_window(&mut state, now);
                Self::enqueue(&mut state, args)
            }
            (ThrottleMode::Both, None) => {
                self.open_window(&mut state, now);
                self.inner.call(args)
            }
            (ThrottleMode::Trailing | ThrottleMode::Both, Some(_)) => {
                trace!("Call deferred to trailing edge");
                Self::enqueue(&mut state, args)
            }
        }
    }

    /// A callable that routes through this throttle
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }

    /// Clear the window so the next call is admitted immediately
    ///
    /// Callers waiting on a trailing execution resolve to `Cancelled`.
    pub fn reset(&self) {
        let dropped = {
            let mut state = self.state.lock();
            state.generation += 1;
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            state.window_end = None;
            state.trailing_args = None;
            mem::take(&mut state.waiters)
        };
        debug!(cancelled = dropped.len(), "Throttle reset");
    }

    /// Time left in the active window
    pub fn remaining(&self) -> Option<Duration> {
        self.state.lock().remaining(Instant::now())
    }

    fn enqueue(state: &mut ThrottleState<A, T, E>, args: A) -> CallFuture<T, E> {
        let (waiter, outcome) = receive();
        state.trailing_args = Some(args);
        state.waiters.push(waiter);
        outcome
    }

    fn open_window(&self, state: &mut ThrottleState<A, T, E>, now: Instant) {
        state.generation += 1;
        state.window_end = Some(now + self.config.interval);
        let fire = Self::fire(self.clone(), state.generation);
        state.timer = Some(TimerHandle::schedule(self.config.interval, fire));
    }

    async fn fire(throttle: Self, generation: u64) {
        let trailing = {
            let mut state = throttle.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.window_end = None;
            let trailing =
                state.trailing_args.take().map(|args| (args, mem::take(&mut state.waiters)));

            // In `both` mode the trailing run starts a window of its own
            if trailing.is_some() && throttle.config.mode == ThrottleMode::Both {
                throttle.open_window(&mut state, Instant::now());
            }
            trailing
        };

        if let Some((args, waiters)) = trailing {
            debug!(callers = waiters.len(), "Throttle window closed, executing trailing call");
            deliver(waiters, throttle.inner.call(args).await);
        }
    }
}

impl<A, T, E> Clone for Throttle<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), config: self.config.clone(), state: Arc::clone(&self.state) }
    }
}

impl<A, T, E> fmt::Debug for Throttle<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle").field("config", &self.config).finish_non_exhaustive()
    }
}
