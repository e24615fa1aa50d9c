//! Cancellable one-shot timers
//!
//! A [`TimerHandle`] owns a tokio task that sleeps for a delay and then runs a
//! callback future. Cancelling aborts the task; cancelling a timer that has
//! already fired is a no-op.
//!
//! Decorators keep at most one handle per instance and always cancel the
//! previous handle before arming a new one. A fired timer's callback should
//! detach itself from decorator state before doing slow work, so that a later
//! `cancel()` aimed at a *pending* timer can never abort an execution that is
//! already in progress.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Handle to a scheduled one-shot timer
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
    delay: Duration,
}

impl TimerHandle {
    /// Schedule `on_fire` to run after `delay`
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(delay_ms = delay.as_millis() as u64, "Scheduling timer");
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });
        Self { task, delay }
    }

    /// Cancel the timer if it has not fired yet
    pub fn cancel(self) {
        if !self.task.is_finished() {
            trace!(delay_ms = self.delay.as_millis() as u64, "Cancelling timer");
        }
        self.task.abort();
    }

    /// Whether the timer task has completed (fired or cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// The delay this timer was armed with
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);

        let handle = TimerHandle::schedule(Duration::from_millis(100), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.delay(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);

        let handle = TimerHandle::schedule(Duration::from_millis(100), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
