//! Retry with backoff
//!
//! Each invocation gets its own attempt counter. The error from the final
//! attempt, or from the first non-retryable attempt, is returned unchanged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use decorum_common::error::{ConfigResult, ErrorClassification};
use decorum_common::resilience::RetryConfig;
use tracing::{debug, warn};

use crate::callable::{CallFuture, Callable};

/// Decides whether an error is worth another attempt
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Observes each scheduled retry as `(failed_attempt, error, delay)`
pub type RetryObserver<E> = Arc<dyn Fn(u32, &E, Duration) + Send + Sync>;

/// Retrying decorator
pub struct Retry<A, T, E> {
    inner: Callable<A, T, E>,
    config: RetryConfig,
    predicate: Option<RetryPredicate<E>>,
    on_retry: Option<RetryObserver<E>>,
}

impl<A, T, E> Retry<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Retry `inner` according to `config`; every error is retryable
    pub fn new(inner: Callable<A, T, E>, config: RetryConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { inner, config, predicate: None, on_retry: None })
    }

    /// Only retry errors for which `predicate` returns true
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Only retry errors that classify themselves as retryable
    pub fn retry_classified(self) -> Self
    where
        E: ErrorClassification,
    {
        self.with_predicate(|error: &E| error.is_retryable())
    }

    /// Observe each retry before its delay starts
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &E, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// The retry configuration in force
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Invoke with retries
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let inner = self.inner.clone();
        let config = self.config.clone();
        let predicate = self.predicate.clone();
        let on_retry = self.on_retry.clone();

        Box::pin(async move {
            let mut attempt = 1;
            loop {
                let error = match inner.call(args.clone()).await {
                    Ok(value) => {
                        if attempt > 1 {
                            debug!(attempt, "Call succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(error) => error,
                };

                if !predicate.as_ref().map_or(true, |retryable| retryable(&error)) {
                    debug!(attempt, "Error is not retryable, giving up");
                    return Err(error);
                }
                if attempt >= config.max_attempts {
                    warn!(attempts = attempt, "Retry attempts exhausted");
                    return Err(error);
                }

                let delay = config.delay_for(attempt);
                if let Some(observer) = &on_retry {
                    observer(attempt, &error, delay);
                }
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        })
    }

    /// A callable that routes through this decorator
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }
}

impl<A, T, E> Clone for Retry<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
            predicate: self.predicate.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for Retry<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("config", &self.config)
            .field("has_predicate", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}
