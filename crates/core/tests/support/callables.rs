//! Scripted callables with invocation counters

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use decorum_core::Callable;
use parking_lot::Mutex;

use super::ServiceError;

/// Counts invocations of a callable built by this module
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    /// Invocations so far
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Unary callable returning `x * 10`, after `delay` when non-zero
pub fn times_ten(delay: Duration) -> (Callable<u32, u32, ServiceError>, CallCounter) {
    let counter = CallCounter::default();
    let calls = counter.clone();
    let callable = Callable::new(move |x: u32| {
        calls.bump();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(x * 10)
        }
    });
    (callable, counter)
}

/// Nullary callable that replays a script of outcomes, then keeps
/// succeeding with the invocation number
pub fn scripted(
    script: Vec<Result<u32, ServiceError>>,
) -> (Callable<(), u32, ServiceError>, CallCounter) {
    let counter = CallCounter::default();
    let calls = counter.clone();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    let callable = Callable::nullary(move || {
        let n = calls.bump();
        let next = script.lock().pop_front().unwrap_or(Ok(n));
        async move { next }
    });
    (callable, counter)
}

/// Nullary callable that succeeds with `value` after `delay`
pub fn after(delay: Duration, value: u32) -> Callable<(), u32, ServiceError> {
    Callable::nullary(move || async move {
        tokio::time::sleep(delay).await;
        Ok(value)
    })
}

/// Nullary callable that fails with `message` after `delay`
pub fn fail_after(delay: Duration, message: &'static str) -> Callable<(), u32, ServiceError> {
    Callable::nullary(move || async move {
        tokio::time::sleep(delay).await;
        Err(ServiceError::upstream(message))
    })
}
