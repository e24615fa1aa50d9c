//! Async testing utilities
//!
//! Decorator tests run on a paused tokio clock. Everything here measures
//! time with `tokio::time`, so a paused runtime auto-advances through these
//! helpers instead of spinning on wall-clock time.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::time::Duration;

/// Wait for a future to complete with a timeout, returning a Result
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

/// Poll an async condition until it returns true or times out
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    condition().await
}

/// Yield to the scheduler enough times for freshly spawned tasks and fired
/// timers to run to their next suspension point
///
/// Does not advance time.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::async_utils.
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_ok_succeeds_and_times_out() {
        let value = timeout_ok(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
        })
        .await;
        assert_eq!(value.unwrap(), 42);

        let elapsed = timeout_ok(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        })
        .await;
        assert!(elapsed.is_err());
    }

    /// Validates polling against a paused clock.
    ///
    /// Assertions:
    /// - Ensures the flag set by a delayed task is observed.
    /// - Ensures a condition that never holds reports `false`.
    #[tokio::test(start_paused = true)]
    async fn test_poll_until() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag_clone.store(true, Ordering::SeqCst);
        });

        let seen = poll_until(Duration::from_secs(1), Duration::from_millis(10), || {
            let flag = Arc::clone(&flag);
            async move { flag.load(Ordering::SeqCst) }
        })
        .await;
        assert!(seen);

        let never =
            poll_until(Duration::from_millis(30), Duration::from_millis(10), || async { false })
                .await;
        assert!(!never);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_runs_spawned_tasks() {
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
