//! Retry policy configuration
//!
//! A [`RetryConfig`] is the stateless part of a retry policy: how many
//! attempts, which backoff, which jitter. The attempt loop itself lives with
//! the retry decorator, which adds the retryable-error predicate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::{BackoffStrategy, Jitter};
use crate::error::{ConfigError, ConfigResult};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter applied on top of the backoff delay
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: BackoffStrategy::default(), jitter: Jitter::None }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        self.backoff.validate()
    }

    /// Delay to wait after failed attempt `attempt`, jitter included
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.backoff.delay_for(attempt))
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn constant_backoff(self, delay: Duration) -> Self {
        self.backoff(BackoffStrategy::constant(delay))
    }

    pub fn linear_backoff(self, initial_delay: Duration, increment: Duration) -> Self {
        self.backoff(BackoffStrategy::linear(initial_delay, increment))
    }

    pub fn exponential_backoff(self, initial_delay: Duration, multiplier: f64) -> Self {
        self.backoff(BackoffStrategy::exponential(initial_delay, multiplier))
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
