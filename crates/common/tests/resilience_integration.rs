//! Integration tests for resilience module
//!
//! Tests the circuit breaker under concurrent half-open admission and a
//! breaker shared between two independent operations, plus retry
//! configuration loaded from settings text.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use decorum_common::resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitState, Jitter, RetryConfig,
};
use decorum_common::{DecoratorError, MockClock};

/// Custom error type for testing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum TestError {
    #[error("upstream failed: {0}")]
    Upstream(&'static str),

    #[error(transparent)]
    Decorator(#[from] DecoratorError),
}

fn mock_breaker(threshold: u32, timeout: Duration) -> (CircuitBreaker<MockClock>, MockClock) {
    let clock = MockClock::new();
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(threshold)
        .timeout(timeout)
        .build()
        .expect("valid config");
    (CircuitBreaker::with_clock(config, clock.clone()).expect("valid breaker"), clock)
}

/// Validates the full open, half-open, closed cycle through `execute`.
///
/// # Test Steps
/// 1. Fail `failure_threshold` times and confirm the breaker opens
/// 2. Confirm the next call is rejected without invoking the operation
/// 3. Advance past the timeout and confirm one trial runs and closes it
#[tokio::test]
async fn test_breaker_recovery_cycle() {
    let (breaker, clock) = mock_breaker(3, Duration::from_secs(30));
    let invocations = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
        let counter = Arc::clone(&invocations);
        let result: Result<u32, TestError> = breaker
            .execute(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Upstream("503"))
            })
            .await;
        assert_eq!(result, Err(TestError::Upstream("503")));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let counter = Arc::clone(&invocations);
    let rejected: Result<u32, TestError> = breaker
        .execute(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await;
    assert_eq!(rejected, Err(TestError::Decorator(DecoratorError::CircuitOpen)));
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    clock.advance(Duration::from_secs(30));
    let counter = Arc::clone(&invocations);
    let recovered: Result<u32, TestError> = breaker
        .execute(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

    assert_eq!(recovered, Ok(7));
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// Validates that concurrent callers cannot all pass a half-open breaker.
///
/// # Test Steps
/// 1. Open the breaker and let the timeout elapse
/// 2. Race 8 tasks into `try_acquire`
/// 3. Verify exactly one trial permit was granted
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_half_open_admits_exactly_one_concurrent_trial() {
    let (breaker, clock) = mock_breaker(1, Duration::from_millis(100));
    breaker.record_failure();
    clock.advance(Duration::from_millis(100));

    let barrier = Arc::new(tokio::sync::Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let breaker = breaker.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                // Hold the permit until every task has tried
                breaker.try_acquire().ok()
            })
        })
        .collect();

    let mut permits = Vec::new();
    for handle in handles {
        if let Some(permit) = handle.await.expect("task panicked") {
            permits.push(permit);
        }
    }

    assert_eq!(permits.len(), 1);
    assert_eq!(breaker.metrics().rejected_calls, 7);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

/// Validates that one breaker shared by two operations trips for both.
#[tokio::test]
async fn test_shared_breaker_guards_both_operations() {
    let (breaker, _clock) = mock_breaker(2, Duration::from_secs(60));
    let search = breaker.clone();
    let checkout = breaker.clone();

    let _: Result<(), TestError> =
        search.execute(|| async { Err(TestError::Upstream("search")) }).await;
    let _: Result<(), TestError> =
        checkout.execute(|| async { Err(TestError::Upstream("checkout")) }).await;

    let blocked: Result<(), TestError> = search.execute(|| async { Ok(()) }).await;
    assert_eq!(blocked, Err(DecoratorError::CircuitOpen.into()));
    assert_eq!(checkout.state(), CircuitState::Open);
}

/// Validates that retry settings text produces the expected delays.
#[test]
fn test_retry_config_from_settings() {
    let config: RetryConfig = serde_json::from_str(
        r#"{
            "max_attempts": 4,
            "backoff": { "kind": "linear", "initial_delay": 100, "increment": 25 },
            "jitter": "none"
        }"#,
    )
    .expect("valid settings");

    assert!(config.validate().is_ok());
    assert_eq!(config.jitter, Jitter::None);
    let delays: Vec<_> = (1..config.max_attempts).map(|attempt| config.delay_for(attempt)).collect();
    assert_eq!(
        delays,
        vec![Duration::from_millis(100), Duration::from_millis(125), Duration::from_millis(150)]
    );

    let capped = BackoffStrategy::exponential_capped(
        Duration::from_millis(100),
        2.0,
        Duration::from_millis(250),
    );
    assert_eq!(capped.delay_for(3), Duration::from_millis(250));
}
