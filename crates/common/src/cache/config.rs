//! Cache configuration types and builder patterns
//!
//! Eviction policy, capacity bound and optional TTL for memoization caches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::impl_mode_conversions;

/// Eviction policy for cache entries when capacity is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least Recently Used - evicts the entry with the oldest last access
    #[default]
    LRU,
    /// Least Frequently Used - evicts the entry with the lowest access count,
    /// ties broken by oldest insertion
    LFU,
    /// First In First Out - evicts the oldest entry by insertion
    FIFO,
    /// Evicts the entry closest to expiry, which is the oldest insertion
    TTL,
}

impl_mode_conversions!(EvictionPolicy {
    LRU => "lru",
    LFU => "lfu",
    FIFO => "fifo",
    TTL => "ttl",
});

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Time-to-live for entries (None = no expiration)
    pub ttl: Option<Duration>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Whether to collect hit/miss/eviction statistics
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: None, ttl: None, eviction_policy: EvictionPolicy::LRU, track_metrics: false }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Bounded LRU cache
    ///
    /// ```
    /// use decorum_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::lru(1000);
    /// assert_eq!(config.max_size, Some(1000));
    /// ```
    pub fn lru(max_size: usize) -> Self {
        Self { max_size: Some(max_size), ..Self::default() }
    }

    /// Bounded LFU cache
    pub fn lfu(max_size: usize) -> Self {
        Self { max_size: Some(max_size), eviction_policy: EvictionPolicy::LFU, ..Self::default() }
    }

    /// Bounded FIFO cache
    pub fn fifo(max_size: usize) -> Self {
        Self { max_size: Some(max_size), eviction_policy: EvictionPolicy::FIFO, ..Self::default() }
    }

    /// Bounded cache whose entries expire after `ttl`, evicting the oldest
    /// entry when full
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use decorum_common::cache::{CacheConfig, EvictionPolicy};
    ///
    /// let config = CacheConfig::ttl(Duration::from_secs(60), 100);
    /// assert_eq!(config.eviction_policy, EvictionPolicy::TTL);
    /// ```
    pub fn ttl(ttl: Duration, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ttl: Some(ttl),
            eviction_policy: EvictionPolicy::TTL,
            track_metrics: false,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == Some(0) {
            return Err(ConfigError::invalid("cache max_size must be greater than 0"));
        }

        if self.ttl == Some(Duration::ZERO) {
            return Err(ConfigError::invalid("cache ttl must be greater than 0"));
        }

        if self.eviction_policy == EvictionPolicy::TTL && self.ttl.is_none() {
            return Err(ConfigError::invalid("ttl eviction policy requires a ttl duration"));
        }

        Ok(())
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    /// Set time-to-live for entries
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.config.ttl = Some(duration);
        self
    }

    /// Set eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Enable or disable metrics tracking
    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::config.
    use super::*;

    #[test]
    fn test_eviction_policy_default() {
        assert_eq!(EvictionPolicy::default(), EvictionPolicy::LRU);
    }

    /// Validates policy names used in settings files.
    ///
    /// Assertions:
    /// - Confirms `"LFU".parse()` yields `EvictionPolicy::LFU`.
    /// - Confirms `EvictionPolicy::TTL` renders as `"ttl"`.
    /// - Confirms serde reads the lowercase name.
    #[test]
    fn test_eviction_policy_names() {
        assert_eq!("LFU".parse::<EvictionPolicy>(), Ok(EvictionPolicy::LFU));
        assert_eq!(EvictionPolicy::TTL.to_string(), "ttl");

        let policy: EvictionPolicy = serde_json::from_str("\"fifo\"").unwrap();
        assert_eq!(policy, EvictionPolicy::FIFO);
    }

    #[test]
    fn test_presets() {
        assert_eq!(CacheConfig::lru(10).eviction_policy, EvictionPolicy::LRU);
        assert_eq!(CacheConfig::lfu(10).eviction_policy, EvictionPolicy::LFU);
        assert_eq!(CacheConfig::fifo(10).eviction_policy, EvictionPolicy::FIFO);

        let ttl = CacheConfig::ttl(Duration::from_secs(5), 10);
        assert_eq!(ttl.ttl, Some(Duration::from_secs(5)));
        assert_eq!(ttl.max_size, Some(10));
        assert!(ttl.validate().is_ok());
    }

    /// Validates `CacheConfig::builder` behavior for the cache config builder
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `config.max_size` equals `Some(500)`.
    /// - Confirms `config.ttl` equals `Some(Duration::from_secs(1800))`.
    /// - Confirms `config.eviction_policy` equals `EvictionPolicy::LFU`.
    /// - Ensures `config.track_metrics` evaluates to true.
    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::builder()
            .max_size(500)
            .ttl(Duration::from_secs(1800))
            .eviction_policy(EvictionPolicy::LFU)
            .track_metrics(true)
            .build()
            .unwrap();

        assert_eq!(config.max_size, Some(500));
        assert_eq!(config.ttl, Some(Duration::from_secs(1800)));
        assert_eq!(config.eviction_policy, EvictionPolicy::LFU);
        assert!(config.track_metrics);
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        assert!(CacheConfig::builder().max_size(0).build().is_err());
        assert!(CacheConfig::builder().ttl(Duration::ZERO).build().is_err());
        assert!(CacheConfig::builder().eviction_policy(EvictionPolicy::TTL).build().is_err());
        assert!(CacheConfig::default().validate().is_ok());
    }
}
