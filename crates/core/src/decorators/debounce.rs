//! Debounce: collapse bursts of calls into one execution
//!
//! Every call restarts the quiet-period timer. What runs, and which result
//! each caller sees, depends on the edge:
//!
//! | Mode | Executes | Callers inside the window receive |
//! |------|----------|-----------------------------------|
//! | `trailing` | once, with the last arguments, when the timer fires | the trailing result |
//! | `leading` | once, immediately, on the first call of a quiet period | the leading result |
//! | `both` | leading immediately, plus a trailing run if more calls arrived | the trailing result |

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use decorum_common::error::{ConfigError, ConfigResult, DecoratorError};
use decorum_common::time::TimerHandle;
use decorum_common::{duration_millis, impl_mode_conversions};
use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{deliver, receive, Waiter};
use crate::callable::{CallFuture, Callable};

/// Which edge of a quiet period executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Run after the burst settles
    #[default]
    Trailing,
    /// Run on the first call of a burst
    Leading,
    /// Run on the first call and again after the burst if it continued
    Both,
}

impl_mode_conversions!(DebounceMode {
    Trailing => "trailing",
    Leading => "leading",
    Both => "both",
});

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period that ends a burst
    #[serde(with = "duration_millis")]
    pub wait: Duration,
    /// Edge that executes
    #[serde(default)]
    pub mode: DebounceMode,
}

impl DebounceConfig {
    /// Trailing-edge debounce
    pub fn trailing(wait: Duration) -> Self {
        Self { wait, mode: DebounceMode::Trailing }
    }

    /// Leading-edge debounce
    pub fn leading(wait: Duration) -> Self {
        Self { wait, mode: DebounceMode::Leading }
    }

    /// Leading and trailing debounce
    pub fn both(wait: Duration) -> Self {
        Self { wait, mode: DebounceMode::Both }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.wait.is_zero() {
            return Err(ConfigError::invalid("debounce wait must be greater than 0"));
        }
        Ok(())
    }
}

type SharedCall<T, E> = Shared<CallFuture<T, E>>;

struct DebounceState<A, T, E> {
    /// Bumped whenever the armed timer is replaced or cancelled
    generation: u64,
    timer: Option<TimerHandle>,
    trailing_args: Option<A>,
    waiters: Vec<Waiter<T, E>>,
    leading: Option<SharedCall<T, E>>,
}

impl<A, T, E> DebounceState<A, T, E> {
    fn new() -> Self {
        Self { generation: 0, timer: None, trailing_args: None, waiters: Vec::new(), leading: None }
    }

    fn disarm(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Debouncing decorator
///
/// Clones share the same window.
pub struct Debounce<A, T, E> {
    inner: Callable<A, T, E>,
    config: DebounceConfig,
    state: Arc<Mutex<DebounceState<A, T, E>>>,
}

impl<A, T, E> Debounce<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: From<DecoratorError> + Clone + Send + Sync + 'static,
{
    /// Debounce `inner`
    pub fn new(inner: Callable<A, T, E>, config: DebounceConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { inner, config, state: Arc::new(Mutex::new(DebounceState::new())) })
    }

    /// Register a call
    ///
    /// Registration happens immediately; the returned future only waits for
    /// the outcome. Must be called from within a tokio runtime.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let mut state = self.state.lock();
        let quiet = state.timer.is_none();

        let outcome = match self.config.mode {
            DebounceMode::Trailing => Self::enqueue(&mut state, args),
            DebounceMode::Leading => {
                let leading = match &state.leading {
                    Some(leading) => leading.clone(),
                    None => {
                        let leading = self.start_leading(args);
                        state.leading = Some(leading.clone());
                        leading
                    }
                };
                leading.boxed()
            }
            DebounceMode::Both if quiet => {
                let leading = self.start_leading(args);
                state.leading = Some(leading.clone());
                leading.boxed()
            }
            DebounceMode::Both => Self::enqueue(&mut state, args),
        };

        self.rearm(&mut state);
        outcome
    }

    /// A callable that routes through this debouncer
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }

    /// Drop the pending trailing call and close the window
    ///
    /// Callers waiting on the trailing execution resolve to `Cancelled`. A
    /// leading execution already in flight is unaffected.
    pub fn cancel(&self) {
        let dropped = {
            let mut state = self.state.lock();
            state.disarm();
            state.trailing_args = None;
            state.leading = None;
            mem::take(&mut state.waiters)
        };
        if !dropped.is_empty() {
            debug!(callers = dropped.len(), "Debounce cancelled pending callers");
        }
    }

    /// Run the pending trailing call now instead of at the end of the window
    ///
    /// Returns false when nothing was pending.
    pub fn flush(&self) -> bool {
        let (args, waiters) = {
            let mut state = self.state.lock();
            let Some(args) = state.trailing_args.take() else {
                return false;
            };
            state.disarm();
            state.leading = None;
            (args, mem::take(&mut state.waiters))
        };

        debug!(callers = waiters.len(), "Debounce flushed early");
        let pending = self.inner.call(args);
        tokio::spawn(async move { deliver(waiters, pending.await) });
        true
    }

    /// Whether a window is currently open
    pub fn is_pending(&self) -> bool {
        self.state.lock().timer.is_some()
    }

    fn enqueue(state: &mut DebounceState<A, T, E>, args: A) -> CallFuture<T, E> {
        let (waiter, outcome) = receive();
        state.trailing_args = Some(args);
        state.waiters.push(waiter);
        outcome
    }

    fn start_leading(&self, args: A) -> SharedCall<T, E> {
        trace!("Debounce executing leading call");
        let leading = self.inner.call(args).shared();
        // Drive the execution even if every caller drops its future
        tokio::spawn(leading.clone().map(drop));
        leading
    }

    fn rearm(&self, state: &mut DebounceState<A, T, E>) {
        state.disarm();
        let generation = state.generation;
        let fire = Self::fire(Arc::clone(&self.state), self.inner.clone(), generation);
        state.timer = Some(TimerHandle::schedule(self.config.wait, fire));
    }

    async fn fire(
        state: Arc<Mutex<DebounceState<A, T, E>>>,
        inner: Callable<A, T, E>,
        generation: u64,
    ) {
        let trailing = {
            let mut state = state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.leading = None;
            state.trailing_args.take().map(|args| (args, mem::take(&mut state.waiters)))
        };

        if let Some((args, waiters)) = trailing {
            debug!(callers = waiters.len(), "Debounce window closed, executing trailing call");
            deliver(waiters, inner.call(args).await);
        }
    }
}

impl<A, T, E> Clone for Debounce<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), config: self.config.clone(), state: Arc::clone(&self.state) }
    }
}

impl<A, T, E> fmt::Debug for Debounce<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce").field("config", &self.config).finish_non_exhaustive()
    }
}
