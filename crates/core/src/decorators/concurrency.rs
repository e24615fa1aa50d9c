//! Lock and semaphore admission control
//!
//! Both share one admission [`Gate`]: a permit count plus a FIFO queue of
//! waiters. A call takes its permit, or its place in the queue, when `call`
//! is invoked, so queued calls run in invocation order regardless of when
//! their futures are first polled. A released permit is handed straight to
//! the next live waiter. Permits are released when the inner call settles,
//! whether it succeeded, failed or was cancelled. A single `Lock` or
//! `Semaphore` may guard several callables.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use decorum_common::error::{ConfigError, ConfigResult, DecoratorError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::callable::{CallFuture, Callable};

struct GateState {
    available: usize,
    queue: VecDeque<oneshot::Sender<Permit>>,
}

/// Permit count and FIFO wait queue shared by every clone of a lock or
/// semaphore
struct Gate {
    capacity: usize,
    state: Mutex<GateState>,
}

impl Gate {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            state: Mutex::new(GateState { available: capacity, queue: VecDeque::new() }),
        })
    }

    /// Take a permit now, or join the back of the queue
    fn admit(self: &Arc<Self>) -> Admission {
        let mut state = self.state.lock();
        // Waiters whose callers went away hold no place in line
        state.queue.retain(|waiter| !waiter.is_closed());

        if state.available > 0 {
            state.available -= 1;
            Admission::Granted(Permit { gate: Some(Arc::clone(self)) })
        } else {
            let (waiter, receiver) = oneshot::channel();
            state.queue.push_back(waiter);
            Admission::Queued(receiver)
        }
    }

    /// Return a permit, handing it to the oldest live waiter if any
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.queue.pop_front() {
            match waiter.send(Permit { gate: Some(Arc::clone(self)) }) {
                Ok(()) => return,
                Err(mut unclaimed) => unclaimed.disarm(),
            }
        }
        state.available += 1;
    }

    fn available(&self) -> usize {
        self.state.lock().available
    }

    fn waiting(&self) -> usize {
        self.state.lock().queue.iter().filter(|waiter| !waiter.is_closed()).count()
    }
}

/// Outcome of [`Gate::admit`]
enum Admission {
    Granted(Permit),
    Queued(oneshot::Receiver<Permit>),
}

impl Admission {
    async fn ready(self) -> Result<Permit, DecoratorError> {
        match self {
            Self::Granted(permit) => Ok(permit),
            Self::Queued(receiver) => receiver.await.map_err(|_| DecoratorError::Cancelled),
        }
    }
}

/// Held while a call runs; dropping it releases the slot
struct Permit {
    gate: Option<Arc<Gate>>,
}

impl Permit {
    /// Forget the gate without releasing, for a permit that was never handed out
    fn disarm(&mut self) {
        self.gate = None;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release();
        }
    }
}

/// Admit through `gate`, then run `inner`
fn guarded<A, T, E>(gate: &Arc<Gate>, inner: &Callable<A, T, E>, args: A) -> CallFuture<T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    let admission = gate.admit();
    let inner = inner.clone();
    let gate = Arc::clone(gate);

    Box::pin(async move {
        let _permit = admission.ready().await.map_err(E::from)?;
        trace!(available = gate.available(), "Admitted");
        inner.call(args).await
    })
}

/// FIFO mutual exclusion across one or more callables
#[derive(Clone)]
pub struct Lock {
    gate: Arc<Gate>,
}

impl Lock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self { gate: Gate::new(1) }
    }

    /// Run `inner` while holding this lock
    ///
    /// The call's place in line is fixed here, not when the returned future
    /// is first polled.
    pub fn call<A, T, E>(&self, inner: &Callable<A, T, E>, args: A) -> CallFuture<T, E>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: From<DecoratorError> + Send + 'static,
    {
        guarded(&self.gate, inner, args)
    }

    /// A callable that runs `inner` under this lock
    pub fn wrap<A, T, E>(&self, inner: Callable<A, T, E>) -> Callable<A, T, E>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: From<DecoratorError> + Send + 'static,
    {
        let lock = self.clone();
        Callable::from_boxed(move |args| lock.call(&inner, args))
    }

    /// Whether a call currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.gate.available() == 0
    }

    /// Number of calls queued behind the holder
    pub fn waiting(&self) -> usize {
        self.gate.waiting()
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("locked", &self.is_locked())
            .field("waiting", &self.waiting())
            .finish()
    }
}

/// Bounded concurrency across one or more callables
#[derive(Clone)]
pub struct Semaphore {
    gate: Arc<Gate>,
}

impl Semaphore {
    /// Allow up to `max_concurrent` calls at once
    pub fn new(max_concurrent: usize) -> ConfigResult<Self> {
        if max_concurrent == 0 {
            return Err(ConfigError::invalid("max_concurrent must be greater than 0"));
        }
        Ok(Self { gate: Gate::new(max_concurrent) })
    }

    /// Run `inner` while holding one permit
    ///
    /// The call's place in line is fixed here, not when the returned future
    /// is first polled.
    pub fn call<A, T, E>(&self, inner: &Callable<A, T, E>, args: A) -> CallFuture<T, E>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: From<DecoratorError> + Send + 'static,
    {
        guarded(&self.gate, inner, args)
    }

    /// A callable that runs `inner` under this semaphore
    pub fn wrap<A, T, E>(&self, inner: Callable<A, T, E>) -> Callable<A, T, E>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: From<DecoratorError> + Send + 'static,
    {
        let semaphore = self.clone();
        Callable::from_boxed(move |args| semaphore.call(&inner, args))
    }

    /// Configured concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.gate.capacity
    }

    /// Permits not currently held
    pub fn available_permits(&self) -> usize {
        self.gate.available()
    }

    /// Calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.gate.capacity - self.available_permits()
    }

    /// Calls queued for a permit
    pub fn waiting(&self) -> usize {
        self.gate.waiting()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("max_concurrent", &self.max_concurrent())
            .field("in_flight", &self.in_flight())
            .field("waiting", &self.waiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for lock and semaphore admission.

    use std::time::Duration;

    use decorum_common::testing::settle;
    use parking_lot::Mutex;
    use tokio::time::sleep;

    use super::*;

    /// Sleeps, then logs `start`/`end` markers for its argument
    fn tracked(log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Callable<u32, u32, DecoratorError> {
        let log = Arc::clone(log);
        Callable::new(move |id: u32| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("start {id}"));
                sleep(Duration::from_millis(10)).await;
                log.lock().push(format!("end {id}"));
                if fail {
                    Err(DecoratorError::state_violation("boom"))
                } else {
                    Ok(id)
                }
            }
        })
    }

    /// Validates FIFO exclusion.
    ///
    /// Assertions:
    /// - Calls never overlap.
    /// - Queued calls run in the order they started waiting.
    #[tokio::test(start_paused = true)]
    async fn test_lock_serializes_in_fifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lock = Lock::new();
        let guarded = lock.wrap(tracked(&log, false));

        let handles: Vec<_> = (1..=3).map(|id| tokio::spawn(guarded.call(id))).collect();
        settle().await;
        assert!(lock.is_locked());
        assert_eq!(lock.waiting(), 2);

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(
            *log.lock(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
        assert!(!lock.is_locked());
        assert_eq!(lock.waiting(), 0);
    }

    /// Validates that queue position is fixed when `call` is invoked.
    ///
    /// Assertions:
    /// - Futures awaited in reverse still run in invocation order.
    #[tokio::test(start_paused = true)]
    async fn test_lock_admits_in_invocation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lock = Lock::new();
        let guarded = lock.wrap(tracked(&log, false));

        let holder = tokio::spawn(guarded.call(0));
        settle().await;
        let first = guarded.call(1);
        let second = guarded.call(2);
        assert_eq!(lock.waiting(), 2);

        let (second, first) = tokio::join!(second, first);
        assert_eq!((first, second), (Ok(1), Ok(2)));
        holder.await.unwrap().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    /// Validates that a dropped waiter gives up its place.
    ///
    /// Assertions:
    /// - The call behind an abandoned waiter is admitted next.
    /// - The lock ends up free.
    #[tokio::test(start_paused = true)]
    async fn test_lock_skips_abandoned_waiter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lock = Lock::new();
        let guarded = lock.wrap(tracked(&log, false));

        let holder = guarded.call(0);
        let abandoned = guarded.call(1);
        let next = guarded.call(2);
        drop(abandoned);
        assert_eq!(lock.waiting(), 1);

        let (held, next) = tokio::join!(holder, next);
        assert_eq!((held, next), (Ok(0), Ok(2)));
        assert_eq!(*log.lock(), vec!["start 0", "end 0", "start 2", "end 2"]);
        assert!(!lock.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_released_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lock = Lock::new();

        assert!(lock.call(&tracked(&log, true), 1).await.is_err());
        assert!(!lock.is_locked());
        assert_eq!(lock.call(&tracked(&log, false), 2).await, Ok(2));
    }

    /// Validates bounded concurrency.
    ///
    /// Assertions:
    /// - At most two calls are in flight at once.
    /// - Permits are returned, including by failed calls.
    #[tokio::test(start_paused = true)]
    async fn test_semaphore_bounds_in_flight() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Semaphore::new(2).unwrap();
        let guarded = semaphore.wrap(tracked(&log, true));

        let handles: Vec<_> = (1..=4).map(|id| tokio::spawn(guarded.call(id))).collect();
        settle().await;
        assert_eq!(semaphore.in_flight(), 2);
        assert_eq!(semaphore.waiting(), 2);
        assert_eq!(log.lock().len(), 2);

        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(semaphore.available_permits(), 2);
        assert_eq!(semaphore.waiting(), 0);
    }

    /// Validates invocation-order admission with one permit per wave.
    ///
    /// Assertions:
    /// - Queued calls start in invocation order even when polled in reverse.
    /// - Permits are all returned at the end.
    #[tokio::test(start_paused = true)]
    async fn test_semaphore_admits_in_invocation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Semaphore::new(1).unwrap();
        let guarded = semaphore.wrap(tracked(&log, false));

        let holder = guarded.call(0);
        let first = guarded.call(1);
        let second = guarded.call(2);
        assert_eq!((semaphore.in_flight(), semaphore.waiting()), (1, 2));

        let (second, first, held) = tokio::join!(second, first, holder);
        assert_eq!((held, first, second), (Ok(0), Ok(1), Ok(2)));
        let starts: Vec<_> =
            log.lock().iter().filter(|line| line.starts_with("start")).cloned().collect();
        assert_eq!(starts, vec!["start 0", "start 1", "start 2"]);
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[test]
    fn test_semaphore_rejects_zero() {
        assert!(Semaphore::new(0).is_err());
    }
}
