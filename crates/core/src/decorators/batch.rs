//! Batch: buffer single calls into one executor invocation
//!
//! A flush takes the whole buffer under the lock, so items that arrive while
//! an executor run is in progress land in the next batch. Each caller receives
//! `Some(result)` for its own position, or `None` when the executor returned
//! fewer results than items (a fire-and-forget sink returns none at all).

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use decorum_common::duration_millis;
use decorum_common::error::{ConfigError, ConfigResult, DecoratorError};
use decorum_common::time::TimerHandle;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{receive, Waiter};
use crate::callable::{CallFuture, Callable};

/// Batch executor: ordered items in, ordered per-item results out
pub type BatchExecutor<I, R, E> =
    Arc<dyn Fn(Vec<I>) -> BoxFuture<'static, Result<Vec<R>, E>> + Send + Sync>;

/// Flush triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Flush as soon as this many items are buffered
    pub max_size: usize,
    /// Flush this long after the oldest buffered item arrived
    #[serde(with = "duration_millis")]
    pub max_wait: Duration,
}

impl BatchConfig {
    /// Create a configuration
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        Self { max_size, max_wait }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Err(ConfigError::invalid("batch max_size must be greater than 0"));
        }
        if self.max_wait.is_zero() {
            return Err(ConfigError::invalid("batch max_wait must be greater than 0"));
        }
        Ok(())
    }
}

struct BatchState<I, R, E> {
    generation: u64,
    items: Vec<I>,
    waiters: Vec<Waiter<Option<R>, E>>,
    timer: Option<TimerHandle>,
}

/// Batching decorator
///
/// Clones share one buffer.
pub struct Batch<I, R, E> {
    executor: BatchExecutor<I, R, E>,
    config: BatchConfig,
    state: Arc<Mutex<BatchState<I, R, E>>>,
}

impl<I, R, E> Batch<I, R, E>
where
    I: Send + 'static,
    R: Send + 'static,
    E: From<DecoratorError> + Clone + Send + 'static,
{
    /// Buffer calls for `executor`
    pub fn new<F, Fut>(executor: F, config: BatchConfig) -> ConfigResult<Self>
    where
        F: Fn(Vec<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, E>> + Send + 'static,
    {
        config.validate()?;
        let state = BatchState { generation: 0, items: Vec::new(), waiters: Vec::new(), timer: None };
        Ok(Self {
            executor: Arc::new(move |items| executor(items).boxed()),
            config,
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Append one item
    ///
    /// The item joins the buffer before this returns. Must be called from
    /// within a tokio runtime.
    pub fn call(&self, item: I) -> CallFuture<Option<R>, E> {
        let (waiter, outcome) = receive();
        let full = {
            let mut state = self.state.lock();
            state.items.push(item);
            state.waiters.push(waiter);

            if state.items.len() >= self.config.max_size {
                Some(self.take(&mut state))
            } else {
                if state.timer.is_none() {
                    let generation = state.generation;
                    let fire = Self::fire(self.clone(), generation);
                    state.timer = Some(TimerHandle::schedule(self.config.max_wait, fire));
                }
                None
            }
        };

        if let Some((items, waiters)) = full {
            debug!(size = items.len(), "Batch full, flushing");
            tokio::spawn(Self::run(Arc::clone(&self.executor), items, waiters));
        }
        outcome
    }

    /// A callable that routes through this batcher
    pub fn callable(&self) -> Callable<I, Option<R>, E> {
        let this = self.clone();
        Callable::from_boxed(move |item| this.call(item))
    }

    /// Flush whatever is buffered now
    ///
    /// Returns the number of items flushed.
    pub fn flush(&self) -> usize {
        let (items, waiters) = self.take(&mut self.state.lock());
        let size = items.len();
        if size > 0 {
            debug!(size, "Batch flushed on request");
            tokio::spawn(Self::run(Arc::clone(&self.executor), items, waiters));
        }
        size
    }

    /// Number of buffered items
    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }

    fn take(&self, state: &mut BatchState<I, R, E>) -> (Vec<I>, Vec<Waiter<Option<R>, E>>) {
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        (mem::take(&mut state.items), mem::take(&mut state.waiters))
    }

    async fn fire(batch: Self, generation: u64) {
        let (items, waiters) = {
            let mut state = batch.state.lock();
            if state.generation != generation {
                return;
            }
            // Detach before flushing so `take` cannot abort this task
            state.timer = None;
            batch.take(&mut state)
        };
        debug!(size = items.len(), "Batch max wait elapsed, flushing");
        Self::run(batch.executor, items, waiters).await;
    }

    #[instrument(skip_all, fields(size = items.len()))]
    async fn run(executor: BatchExecutor<I, R, E>, items: Vec<I>, waiters: Vec<Waiter<Option<R>, E>>) {
        let expected = items.len();
        match executor(items).await {
            Ok(results) => {
                if !results.is_empty() && results.len() != expected {
                    warn!(expected, returned = results.len(), "Batch executor result count mismatch");
                }
                let mut results = results.into_iter();
                for waiter in waiters {
                    let _ = waiter.send(Ok(results.next()));
                }
            }
            Err(error) => {
                for waiter in waiters {
                    let _ = waiter.send(Err(error.clone()));
                }
            }
        }
    }
}

impl<I, R, E> Clone for Batch<I, R, E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, R, E> fmt::Debug for Batch<I, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the batch decorator.

    use tokio::time::sleep;

    use super::*;

    type Seen = Arc<Mutex<Vec<Vec<u32>>>>;

    /// Executor that records each batch and doubles every item
    fn doubling(seen: &Seen) -> impl Fn(Vec<u32>) -> BoxFuture<'static, Result<Vec<u32>, DecoratorError>> {
        let seen = Arc::clone(seen);
        move |items: Vec<u32>| {
            seen.lock().push(items.clone());
            async move { Ok(items.into_iter().map(|x| x * 2).collect()) }.boxed()
        }
    }

    /// Validates the size trigger.
    ///
    /// Assertions:
    /// - Three calls with `max_size = 3` cause exactly one executor run.
    /// - The run carries all three items in insertion order.
    /// - Each caller receives the result for its own item.
    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_flushes_once_in_order() {
        let seen = Seen::default();
        let batch = Batch::new(doubling(&seen), BatchConfig::new(3, Duration::from_secs(10))).unwrap();

        let a = batch.call(1);
        let b = batch.call(2);
        let c = batch.call(3);
        assert_eq!(batch.pending(), 0);

        assert_eq!(tokio::join!(a, b, c), (Ok(Some(2)), Ok(Some(4)), Ok(Some(6))));
        assert_eq!(*seen.lock(), vec![vec![1, 2, 3]]);
    }

    /// Validates the max-wait trigger.
    #[tokio::test(start_paused = true)]
    async fn test_max_wait_flushes_partial_batch() {
        let seen = Seen::default();
        let batch = Batch::new(doubling(&seen), BatchConfig::new(10, Duration::from_millis(50))).unwrap();

        let a = batch.call(7);
        sleep(Duration::from_millis(20)).await;
        let b = batch.call(8);
        assert_eq!(batch.pending(), 2);

        let start = tokio::time::Instant::now();
        assert_eq!(tokio::join!(a, b), (Ok(Some(14)), Ok(Some(16))));
        // Measured from the oldest item, not the newest
        assert_eq!(start.elapsed(), Duration::from_millis(30));
        assert_eq!(*seen.lock(), vec![vec![7, 8]]);
    }

    /// Validates that a sink returning nothing yields `None` per caller.
    #[tokio::test(start_paused = true)]
    async fn test_sink_without_results_yields_none() {
        let sunk = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&sunk);
        let batch = Batch::new(
            move |items: Vec<&'static str>| {
                store.lock().extend(items);
                async { Ok::<Vec<()>, DecoratorError>(Vec::new()) }
            },
            BatchConfig::new(2, Duration::from_secs(1)),
        )
        .unwrap();

        let (a, b) = tokio::join!(batch.call("x"), batch.call("y"));
        assert_eq!((a, b), (Ok(None), Ok(None)));
        assert_eq!(*sunk.lock(), vec!["x", "y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_error_is_shared() {
        let batch = Batch::new(
            |_: Vec<u32>| async { Err::<Vec<u32>, _>(DecoratorError::state_violation("sink offline")) },
            BatchConfig::new(2, Duration::from_secs(1)),
        )
        .unwrap();

        let (a, b) = tokio::join!(batch.call(1), batch.call(2));
        assert_eq!(a, Err(DecoratorError::state_violation("sink offline")));
        assert_eq!(a, b);
    }

    /// Validates manual flush and that later items start a new batch.
    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_then_new_batch() {
        let seen = Seen::default();
        let batch = Batch::new(doubling(&seen), BatchConfig::new(10, Duration::from_millis(100))).unwrap();

        let a = batch.call(1);
        assert_eq!(batch.flush(), 1);
        let b = batch.call(2);
        assert_eq!(batch.pending(), 1);

        assert_eq!(a.await, Ok(Some(2)));
        assert_eq!(b.await, Ok(Some(4)));
        assert_eq!(*seen.lock(), vec![vec![1], vec![2]]);
        assert_eq!(batch.flush(), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(BatchConfig::new(0, Duration::from_millis(1)).validate().is_err());
        assert!(BatchConfig::new(1, Duration::ZERO).validate().is_err());

        let config: BatchConfig = serde_json::from_str(r#"{"max_size":5,"max_wait":20}"#).unwrap();
        assert_eq!(config, BatchConfig::new(5, Duration::from_millis(20)));
    }
}
