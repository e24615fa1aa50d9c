//! Bounded key/value cache backing the memoize decorator
//!
//! - **Bounded**: an optional capacity; inserting a new key into a full cache
//!   evicts exactly one entry first
//! - **Eviction policies**: LRU, LFU (ties go to the oldest insertion), FIFO,
//!   TTL (oldest insertion, which is the entry closest to expiry)
//! - **TTL**: combinable with any policy; expired entries read as absent and
//!   are swept before a capacity eviction is attempted
//! - **Statistics**: optional hit/miss/insert/eviction/expiration counters
//! - **Testable**: reads time through [`Clock`](crate::time::Clock)
//!
//! # Example
//! ```
//! use std::time::Duration;
//!
//! use decorum_common::cache::{derive_key, Cache, CacheConfig, EvictionPolicy};
//!
//! let config = CacheConfig::builder()
//!     .max_size(500)
//!     .ttl(Duration::from_secs(1800))
//!     .eviction_policy(EvictionPolicy::LFU)
//!     .track_metrics(true)
//!     .build()
//!     .unwrap();
//!
//! let cache: Cache<String, i32> = Cache::new(config).unwrap();
//! let key = derive_key(&("user", 42)).unwrap();
//! cache.put(key.clone(), 7);
//! assert_eq!(cache.get(&key), Some(7));
//! assert_eq!(cache.stats().hits, 1);
//! ```

mod config;
mod core;
mod key;
mod stats;

pub use core::Cache;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use key::derive_key;
pub use stats::CacheStats;
