//! Circuit breaker state machine
//!
//! ```text
//!            failures >= failure_threshold
//!   Closed ─────────────────────────────────▶ Open
//!     ▲                                        │
//!     │ successes >= success_threshold         │ timeout elapsed,
//!     │                                        │ on the next call
//!     └──────────── HalfOpen ◀─────────────────┘
//!                     │
//!                     └── any failure ──▶ Open (timeout clock restarts)
//! ```
//!
//! All counters live behind a single lock. Admission ([`CircuitBreaker::try_acquire`])
//! and result recording are each one critical section, so concurrent callers
//! can never all slip through a half-open breaker: at most
//! `half_open_max_calls` trial permits exist at a time.
//!
//! Every transition bumps an epoch. A permit remembers the epoch it was
//! issued in, and a result reported against an older epoch only updates the
//! totals. A call admitted while Closed that fails after the breaker already
//! opened therefore cannot reopen a later half-open trial window.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{ConfigError, ConfigResult, DecoratorError};
use crate::impl_mode_conversions;
use crate::time::{Clock, SystemClock};
use crate::utils::serde::duration_millis;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited trial requests
    HalfOpen,
}

impl_mode_conversions!(CircuitState {
    Closed => "closed",
    Open => "open",
    HalfOpen => "half_open",
});

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Trial successes needed to close the circuit from half-open
    pub success_threshold: u32,
    /// Time to wait in Open before letting a trial call through
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Maximum number of concurrent trial calls while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("success_threshold must be greater than 0"));
        }

        if self.half_open_max_calls == 0 {
            return Err(ConfigError::invalid("half_open_max_calls must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    /// Consecutive failures counted toward opening
    pub consecutive_failures: u32,
    /// Successful trials in the current half-open window
    pub half_open_successes: u32,
    /// Trial calls currently in flight
    pub half_open_in_flight: u32,
    /// Calls admitted since creation or the last reset
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Calls refused with `CircuitOpen`
    pub rejected_calls: u64,
    pub opened_at: Option<Instant>,
    pub state_changed_at: Instant,
}

/// Callback invoked as `(from, to)` after every state transition
pub type StateObserver = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    epoch: u64,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    rejected_calls: u64,
    opened_at: Option<Instant>,
    state_changed_at: Instant,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            epoch: 0,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            rejected_calls: 0,
            opened_at: None,
            state_changed_at: now,
        }
    }

    /// Move to `to`, returning the `(from, to)` pair for observers
    fn transition(&mut self, to: CircuitState, now: Instant) -> (CircuitState, CircuitState) {
        let from = self.state;
        self.state = to;
        self.epoch += 1;
        self.state_changed_at = now;
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;

        match to {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }
        (from, to)
    }
}

struct Inner<C> {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    observer: RwLock<Option<StateObserver>>,
    clock: C,
}

/// Shared circuit breaker
///
/// Cloning yields another handle to the same breaker, which is how one
/// breaker guards several callables.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.inner.config)
            .field("state", &state.state)
            .field("consecutive_failures", &state.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(BreakerState::new(now)),
                observer: RwLock::new(None),
                clock,
            }),
        })
    }

    /// The configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    /// Register a callback for state transitions, replacing any previous one
    ///
    /// The callback runs after the state lock is released.
    pub fn set_state_observer<F>(&self, observer: F)
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        *self.inner.observer.write() = Some(Arc::new(observer));
    }

    /// Ask to run one call
    ///
    /// Closed admits. Open rejects until the timeout has elapsed, at which
    /// point this call moves the breaker to HalfOpen and is admitted as a
    /// trial. HalfOpen admits up to `half_open_max_calls` concurrent trials
    /// and rejects the rest.
    pub fn try_acquire(&self) -> Result<CircuitPermit<C>, DecoratorError> {
        let now = self.inner.clock.now();
        let mut transition = None;

        let admitted = {
            let mut state = self.inner.state.lock();

            if state.state == CircuitState::Open {
                let opened_at = state.opened_at.unwrap_or(state.state_changed_at);
                if now.saturating_duration_since(opened_at) >= self.inner.config.timeout {
                    transition = Some(state.transition(CircuitState::HalfOpen, now));
                }
            }

            let admitted = match state.state {
                CircuitState::Closed => Some((state.epoch, false)),
                CircuitState::HalfOpen
                    if state.half_open_in_flight < self.inner.config.half_open_max_calls =>
                {
                    state.half_open_in_flight += 1;
                    Some((state.epoch, true))
                }
                CircuitState::Open | CircuitState::HalfOpen => None,
            };

            if admitted.is_some() {
                state.total_calls += 1;
            } else {
                state.rejected_calls += 1;
            }
            admitted
        };

        if let Some((from, to)) = transition {
            info!(%from, %to, "Circuit breaker timeout elapsed, admitting trial call");
            self.notify(from, to);
        }

        match admitted {
            Some((epoch, trial)) => {
                Ok(CircuitPermit { breaker: self.clone(), epoch, trial, settled: false })
            }
            None => {
                debug!(state = %self.state(), "Circuit breaker rejecting call");
                Err(DecoratorError::CircuitOpen)
            }
        }
    }

    /// Run `operation` under the breaker
    ///
    /// Rejected calls fail with `CircuitOpen` converted into the caller's
    /// error type; the operation's own errors are returned unchanged.
    #[instrument(skip_all, fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DecoratorError>,
    {
        let permit = self.try_acquire().map_err(E::from)?;

        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(error) => {
                permit.record_failure();
                Err(error)
            }
        }
    }

    /// Record a success observed outside a permit
    pub fn record_success(&self) {
        let epoch = self.inner.state.lock().epoch;
        self.settle(epoch, false, true);
    }

    /// Record a failure observed outside a permit
    pub fn record_failure(&self) {
        let epoch = self.inner.state.lock().epoch;
        self.settle(epoch, false, false);
    }

    /// Get the current state
    ///
    /// An Open breaker whose timeout has elapsed still reports Open until the
    /// next call arrives.
    pub fn state(&self) -> CircuitState {
        self.inner.state.lock().state
    }

    /// Get a metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.inner.state.lock();
        CircuitBreakerMetrics {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            half_open_successes: state.half_open_successes,
            half_open_in_flight: state.half_open_in_flight,
            total_calls: state.total_calls,
            total_successes: state.total_successes,
            total_failures: state.total_failures,
            rejected_calls: state.rejected_calls,
            opened_at: state.opened_at,
            state_changed_at: state.state_changed_at,
        }
    }

    /// Reset to Closed with all counters cleared
    ///
    /// Permits issued before the reset no longer affect the state.
    pub fn reset(&self) {
        let now = self.inner.clock.now();
        let from = {
            let mut state = self.inner.state.lock();
            let from = state.state;
            let epoch = state.epoch + 1;
            *state = BreakerState::new(now);
            state.epoch = epoch;
            from
        };

        info!(%from, "Circuit breaker manually reset to closed state");
        if from != CircuitState::Closed {
            self.notify(from, CircuitState::Closed);
        }
    }

    fn settle(&self, epoch: u64, trial: bool, success: bool) {
        let now = self.inner.clock.now();
        let config = &self.inner.config;

        let transition = {
            let mut state = self.inner.state.lock();
            if success {
                state.total_successes += 1;
            } else {
                state.total_failures += 1;
            }

            if state.epoch != epoch {
                return;
            }
            if trial {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
            }

            match (state.state, success) {
                (CircuitState::Closed, true) => {
                    state.consecutive_failures = 0;
                    None
                }
                (CircuitState::Closed, false) => {
                    state.consecutive_failures += 1;
                    (state.consecutive_failures >= config.failure_threshold)
                        .then(|| state.transition(CircuitState::Open, now))
                }
                (CircuitState::HalfOpen, true) => {
                    state.half_open_successes += 1;
                    (state.half_open_successes >= config.success_threshold)
                        .then(|| state.transition(CircuitState::Closed, now))
                }
                (CircuitState::HalfOpen, false) => Some(state.transition(CircuitState::Open, now)),
                (CircuitState::Open, _) => None,
            }
        };

        if let Some((from, to)) = transition {
            if to == CircuitState::Open {
                warn!(%from, threshold = config.failure_threshold, "Circuit breaker opened");
            } else {
                info!(%from, %to, "Circuit breaker state changed");
            }
            self.notify(from, to);
        }
    }

    fn release(&self, epoch: u64) {
        let mut state = self.inner.state.lock();
        if state.epoch == epoch {
            state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        let observer = self.inner.observer.read().clone();
        if let Some(observer) = observer {
            observer(from, to);
        }
    }
}

/// Admission ticket for one call through a breaker
///
/// Report the outcome with [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). Dropping an unsettled trial
/// permit (for example when the call's future is cancelled) frees its
/// half-open slot without counting a result.
#[must_use = "a permit must be settled with record_success or record_failure"]
pub struct CircuitPermit<C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
    epoch: u64,
    trial: bool,
    settled: bool,
}

impl<C: Clock> CircuitPermit<C> {
    /// Whether this permit was issued as a half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle(self.epoch, self.trial, true);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.settle(self.epoch, self.trial, false);
    }
}

impl<C: Clock> Drop for CircuitPermit<C> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release(self.epoch);
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitPermit<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitPermit")
            .field("epoch", &self.epoch)
            .field("trial", &self.trial)
            .finish()
    }
}
