//! Parallel combinators: race and all
//!
//! Both launch the primary callable and every competitor with the same
//! arguments at call time. Index 0 is the primary; competitors follow in the
//! order they were given. Callbacks fire in the order contenders settle.

use std::fmt;
use std::sync::Arc;

use decorum_common::error::DecoratorError;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::callable::{CallFuture, Callable};

/// Receives `(index, value)` for the winning contender
pub type WinObserver<T> = Arc<dyn Fn(usize, &T) + Send + Sync>;

/// Receives `(index, outcome)` for every contender that did not win
pub type LoseObserver<T, E> = Arc<dyn Fn(usize, Result<&T, &E>) + Send + Sync>;

/// Receives `(index, value)` for each successful contender of an `all`
pub type CompleteObserver<T> = Arc<dyn Fn(usize, &T) + Send + Sync>;

type Contest<T, E> = FuturesUnordered<BoxFuture<'static, (usize, Result<T, E>)>>;

fn launch<A, T, E>(contenders: &[Callable<A, T, E>], args: A) -> Contest<T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    contenders
        .iter()
        .enumerate()
        .map(|(index, contender)| contender.call(args.clone()).map(move |result| (index, result)).boxed())
        .collect()
}

/// First success wins
pub struct Race<A, T, E> {
    contenders: Vec<Callable<A, T, E>>,
    on_win: Option<WinObserver<T>>,
    on_lose: Option<LoseObserver<T, E>>,
}

impl<A, T, E> Race<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + Send + 'static,
{
    /// Race `primary` against `competitors`
    pub fn new<I>(primary: Callable<A, T, E>, competitors: I) -> Self
    where
        I: IntoIterator<Item = Callable<A, T, E>>,
    {
        let contenders = std::iter::once(primary).chain(competitors).collect();
        Self { contenders, on_win: None, on_lose: None }
    }

    /// Observe the winner
    pub fn on_win<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, &T) + Send + Sync + 'static,
    {
        self.on_win = Some(Arc::new(observer));
        self
    }

    /// Observe every loser as it settles, including those settling after the
    /// race was decided
    pub fn on_lose<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, Result<&T, &E>) + Send + Sync + 'static,
    {
        self.on_lose = Some(Arc::new(observer));
        self
    }

    /// Run the race
    ///
    /// Resolves with the first success. Contenders still running at that
    /// point keep running on a background task. If every contender fails the
    /// first error to arrive is returned.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let mut contest = launch(&self.contenders, args);
        let on_win = self.on_win.clone();
        let on_lose = self.on_lose.clone();

        Box::pin(async move {
            let mut first_error = None;
            while let Some((index, result)) = contest.next().await {
                match result {
                    Ok(value) => {
                        debug!(index, remaining = contest.len(), "Race won");
                        if let Some(on_win) = &on_win {
                            on_win(index, &value);
                        }
                        if !contest.is_empty() {
                            tokio::spawn(Self::settle_losers(contest, on_lose));
                        }
                        return Ok(value);
                    }
                    Err(error) => {
                        if let Some(on_lose) = &on_lose {
                            on_lose(index, Err(&error));
                        }
                        first_error.get_or_insert(error);
                    }
                }
            }

            warn!("Every race contender failed");
            Err(first_error
                .unwrap_or_else(|| E::from(DecoratorError::state_violation("race has no contenders"))))
        })
    }

    /// A callable that runs this race
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }

    async fn settle_losers(mut contest: Contest<T, E>, on_lose: Option<LoseObserver<T, E>>) {
        while let Some((index, result)) = contest.next().await {
            if let Some(on_lose) = &on_lose {
                on_lose(index, result.as_ref());
            }
        }
    }
}

impl<A, T, E> Clone for Race<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            contenders: self.contenders.clone(),
            on_win: self.on_win.clone(),
            on_lose: self.on_lose.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for Race<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Race").field("contenders", &self.contenders.len()).finish_non_exhaustive()
    }
}

/// Run every contender and collect results in input order
pub struct All<A, T, E> {
    contenders: Vec<Callable<A, T, E>>,
    fail_fast: bool,
    on_complete: Option<CompleteObserver<T>>,
}

impl<A, T, E> All<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: From<DecoratorError> + fmt::Display + Send + 'static,
{
    /// Run `primary` and `others` together, failing fast
    pub fn new<I>(primary: Callable<A, T, E>, others: I) -> Self
    where
        I: IntoIterator<Item = Callable<A, T, E>>,
    {
        let contenders = std::iter::once(primary).chain(others).collect();
        Self { contenders, fail_fast: true, on_complete: None }
    }

    /// Choose between failing on the first error (the default) and waiting
    /// for every contender before reporting an aggregate failure
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Observe each success as it happens
    pub fn on_complete<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, &T) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(observer));
        self
    }

    /// Run every contender
    ///
    /// In fail-fast mode the first error is returned and the remaining
    /// contenders are dropped. Otherwise all contenders run to completion and
    /// any failures are reported together as `Aggregate`.
    pub fn call(&self, args: A) -> CallFuture<Vec<T>, E> {
        let total = self.contenders.len();
        let mut contest = launch(&self.contenders, args);
        let fail_fast = self.fail_fast;
        let on_complete = self.on_complete.clone();

        Box::pin(async move {
            let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
            let mut failures = Vec::new();

            while let Some((index, result)) = contest.next().await {
                match result {
                    Ok(value) => {
                        if let Some(on_complete) = &on_complete {
                            on_complete(index, &value);
                        }
                        slots[index] = Some(value);
                    }
                    Err(error) if fail_fast => {
                        debug!(index, abandoned = contest.len(), "Parallel call failed fast");
                        return Err(error);
                    }
                    Err(error) => failures.push((index, error.to_string())),
                }
            }

            if !failures.is_empty() {
                failures.sort_by_key(|(index, _)| *index);
                warn!(failed = failures.len(), total, "Parallel calls failed");
                return Err(E::from(DecoratorError::Aggregate { total, failures }));
            }
            Ok(slots.into_iter().flatten().collect())
        })
    }
}

impl<A, T, E> Clone for All<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            contenders: self.contenders.clone(),
            fail_fast: self.fail_fast,
            on_complete: self.on_complete.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for All<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("All")
            .field("contenders", &self.contenders.len())
            .field("fail_fast", &self.fail_fast)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for race and all.

    use std::time::Duration;

    use decorum_common::testing::settle;
    use parking_lot::Mutex;
    use tokio::time::sleep;

    use super::*;

    /// Resolves to `value` (or fails with it) after `delay_ms`
    fn delayed(delay_ms: u64, value: u32, fail: bool) -> Callable<(), u32, DecoratorError> {
        Callable::nullary(move || async move {
            sleep(Duration::from_millis(delay_ms)).await;
            if fail {
                Err(DecoratorError::state_violation(format!("contender {value} failed")))
            } else {
                Ok(value)
            }
        })
    }

    /// Validates that the fastest contender wins.
    ///
    /// Assertions:
    /// - With B fastest, the result is B's and `on_win` fires once with B's index.
    /// - Losers are reported after the race resolves.
    #[tokio::test(start_paused = true)]
    async fn test_race_fastest_wins() {
        let wins = Arc::new(Mutex::new(Vec::new()));
        let losses = Arc::new(Mutex::new(Vec::new()));
        let (win_log, lose_log) = (Arc::clone(&wins), Arc::clone(&losses));

        let race = Race::new(delayed(50, 1, false), [delayed(10, 2, false), delayed(30, 3, false)])
            .on_win(move |index, value| win_log.lock().push((index, *value)))
            .on_lose(move |index, _| lose_log.lock().push(index));

        assert_eq!(race.call(()).await, Ok(2));
        assert_eq!(*wins.lock(), vec![(1, 2)]);
        assert!(losses.lock().is_empty());

        sleep(Duration::from_millis(60)).await;
        settle().await;
        assert_eq!(*losses.lock(), vec![2, 0]);
        assert_eq!(wins.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_skips_failures() {
        let race = Race::new(delayed(5, 1, true), [delayed(20, 2, false)]);
        assert_eq!(race.call(()).await, Ok(2));
    }

    /// Validates that a race with no success returns the first error.
    #[tokio::test(start_paused = true)]
    async fn test_race_all_fail_returns_first_error() {
        let race = Race::new(delayed(30, 1, true), [delayed(10, 2, true)]);
        assert_eq!(
            race.call(()).await,
            Err(DecoratorError::state_violation("contender 2 failed"))
        );
    }

    /// Validates input-order results regardless of completion order.
    #[tokio::test(start_paused = true)]
    async fn test_all_preserves_input_order() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&completed);
        let all = All::new(delayed(30, 1, false), [delayed(10, 2, false), delayed(20, 3, false)])
            .on_complete(move |index, _| log.lock().push(index));

        assert_eq!(all.call(()).await, Ok(vec![1, 2, 3]));
        assert_eq!(*completed.lock(), vec![1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_fail_fast_returns_first_error() {
        let all = All::new(delayed(50, 1, false), [delayed(10, 2, true), delayed(20, 3, true)]);

        let start = tokio::time::Instant::now();
        assert_eq!(
            all.call(()).await,
            Err(DecoratorError::state_violation("contender 2 failed"))
        );
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }

    /// Validates aggregate reporting without fail-fast.
    ///
    /// Assertions:
    /// - Every contender is awaited.
    /// - Successes are still reported through `on_complete`.
    /// - Failures are listed by index in input order.
    #[tokio::test(start_paused = true)]
    async fn test_all_aggregates_failures() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&completed);
        let all = All::new(delayed(30, 1, true), [delayed(40, 2, false), delayed(10, 3, true)])
            .fail_fast(false)
            .on_complete(move |index, value| log.lock().push((index, *value)));

        let start = tokio::time::Instant::now();
        let error = all.call(()).await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_millis(40));
        assert_eq!(*completed.lock(), vec![(1, 2)]);
        assert_eq!(
            error,
            DecoratorError::Aggregate {
                total: 3,
                failures: vec![
                    (0, "state violation: contender 1 failed".to_string()),
                    (2, "state violation: contender 3 failed".to_string()),
                ],
            }
        );
    }
}
