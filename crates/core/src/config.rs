//! Decorator settings loaded from TOML or JSON
//!
//! Every section is optional; absent sections mean the decorator is not
//! configured. Durations are integer milliseconds throughout.
//!
//! ```toml
//! timeout = 2000
//!
//! [memoize]
//! max_size = 500
//! ttl = 60000
//! policy = "lfu"
//!
//! [retry]
//! max_attempts = 4
//! jitter = "equal"
//! backoff = { kind = "exponential", initial_delay = 100, multiplier = 2.0, max_delay = 5000 }
//!
//! [circuit_breaker]
//! failure_threshold = 5
//! timeout = 30000
//!
//! [throttle]
//! interval = 250
//! mode = "both"
//! ```

use std::path::Path;
use std::time::Duration;

use decorum_common::cache::{CacheConfig, EvictionPolicy};
use decorum_common::error::{ConfigError, ConfigResult};
use decorum_common::option_duration_millis;
use decorum_common::resilience::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decorators::{BatchConfig, DebounceConfig, ThrottleConfig};

/// Memoization cache settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoizeSettings {
    /// Capacity bound (absent = unbounded)
    pub max_size: Option<usize>,
    /// Entry lifetime (absent = no expiry)
    #[serde(with = "option_duration_millis")]
    pub ttl: Option<Duration>,
    /// Eviction policy at capacity
    pub policy: EvictionPolicy,
    /// Collect hit/miss statistics
    pub track_metrics: bool,
}

impl MemoizeSettings {
    /// The cache configuration these settings describe
    pub fn cache_config(&self) -> ConfigResult<CacheConfig> {
        let config = CacheConfig {
            max_size: self.max_size,
            ttl: self.ttl,
            eviction_policy: self.policy,
            track_metrics: self.track_metrics,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Semaphore settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemaphoreSettings {
    /// Calls allowed to run at once
    pub max_concurrent: usize,
}

/// Settings for a decorator pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Memoization cache
    pub memoize: Option<MemoizeSettings>,
    /// Retry policy
    pub retry: Option<RetryConfig>,
    /// Circuit breaker
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Debounce window
    pub debounce: Option<DebounceConfig>,
    /// Throttle window
    pub throttle: Option<ThrottleConfig>,
    /// Batch flush triggers
    pub batch: Option<BatchConfig>,
    /// Concurrency bound
    pub semaphore: Option<SemaphoreSettings>,
    /// Per-call deadline
    #[serde(with = "option_duration_millis")]
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Parse TOML settings and validate them
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let settings: Self = toml::from_str(text)
            .map_err(|err| ConfigError::Parse { format: "TOML", message: err.to_string() })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse JSON settings and validate them
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file, choosing the format by extension
    ///
    /// `.json` files are parsed as JSON; anything else as TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), json = is_json, "Loading decorator settings");
        let settings = if is_json { Self::from_json_str(&text)? } else { Self::from_toml_str(&text)? };
        info!(path = %path.display(), "Decorator settings loaded");
        Ok(settings)
    }

    /// Validate every configured section
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(memoize) = &self.memoize {
            memoize.cache_config()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        if let Some(breaker) = &self.circuit_breaker {
            breaker.validate()?;
        }
        if let Some(debounce) = &self.debounce {
            debounce.validate()?;
        }
        if let Some(throttle) = &self.throttle {
            throttle.validate()?;
        }
        if let Some(batch) = &self.batch {
            batch.validate()?;
        }
        if self.semaphore.is_some_and(|semaphore| semaphore.max_concurrent == 0) {
            return Err(ConfigError::invalid("max_concurrent must be greater than 0"));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::invalid("timeout must be greater than 0"));
        }
        Ok(())
    }
}
