//! Core cache implementation with configurable eviction policies
//!
//! Every entry carries an insertion sequence number and an access tick drawn
//! from per-cache counters, so eviction order is total even when two clock
//! readings tie. Victim selection is a linear scan; memoization caches are
//! small and the scan keeps every policy in one structure.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use crate::error::ConfigResult;
use crate::time::{Clock, SystemClock};

/// Entry stored in the cache with metadata for eviction policies
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    /// Position in insertion order
    seq: u64,
    /// Position in access order (insertion counts as an access)
    tick: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.inserted_at) >= ttl)
    }
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    next_seq: u64,
    next_tick: u64,
}

impl<K, V> CacheStorage<K, V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), next_seq: 0, next_tick: 0 }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn bump_tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }
}

/// Generic thread-safe cache with configurable eviction policies
///
/// Clones share the same storage, so one cache can back several memoized
/// callables.
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock type for TTL checks (defaults to `SystemClock`)
///
/// # Example
/// ```
/// use decorum_common::cache::{Cache, CacheConfig};
///
/// let cache: Cache<String, i32> = Cache::new(CacheConfig::lru(2)).unwrap();
/// cache.put("a".to_string(), 1);
/// cache.put("b".to_string(), 2);
/// let _ = cache.get(&"a".to_string());
/// cache.put("c".to_string(), 3);
///
/// assert!(cache.contains_key(&"a".to_string()));
/// assert!(!cache.contains_key(&"b".to_string()));
/// ```
pub struct Cache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Arc<Mutex<CacheStorage<K, V>>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> Cache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given configuration using the system clock
    pub fn new(config: CacheConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            storage: Arc::new(Mutex::new(CacheStorage::new())),
            config,
            metrics: MetricsCollector::new(),
            clock,
        })
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store a value
    ///
    /// Replacing an existing key never evicts; the entry's metadata starts
    /// over as if it were freshly inserted. Inserting a new key into a full
    /// cache first sweeps expired entries, then evicts exactly one entry by
    /// policy if the sweep did not make room.
    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        if let Some(max_size) = self.config.max_size {
            if !storage.entries.contains_key(&key) && storage.entries.len() >= max_size {
                self.sweep_expired(&mut storage, now);
                if storage.entries.len() >= max_size {
                    self.evict_one_locked(&mut storage);
                }
            }
        }

        let seq = storage.bump_seq();
        let tick = storage.bump_tick();
        let entry =
            CacheEntry { value, inserted_at: now, last_accessed: now, access_count: 0, seq, tick };
        storage.entries.insert(key, entry);

        if self.config.track_metrics {
            self.metrics.record_insert();
        }
    }

    /// Look up a value
    ///
    /// Expired entries are treated as absent and removed. A hit refreshes the
    /// entry's recency and frequency and touches no other entry.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let expired = match storage.entries.get(key) {
            None => {
                self.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(self.config.ttl, now),
        };

        if expired {
            storage.entries.remove(key);
            self.record_miss();
            if self.config.track_metrics {
                self.metrics.record_expirations(1);
            }
            return None;
        }

        let tick = storage.bump_tick();
        let entry = storage.entries.get_mut(key)?;
        entry.last_accessed = now;
        entry.access_count += 1;
        entry.tick = tick;

        if self.config.track_metrics {
            self.metrics.record_hit();
        }
        Some(entry.value.clone())
    }

    /// Look up a value without touching access metadata or statistics
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let storage = self.storage.lock();
        storage
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(self.config.ttl, now))
            .map(|entry| entry.value.clone())
    }

    /// Whether a live (unexpired) entry exists for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.storage
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.config.ttl, now))
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        self.storage.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Evict one entry according to the configured policy
    ///
    /// Returns the evicted key, or `None` when the cache is empty.
    pub fn evict_one(&self) -> Option<K> {
        let mut storage = self.storage.lock();
        self.evict_one_locked(&mut storage)
    }

    /// Clear all entries and reset statistics
    pub fn clear(&self) {
        self.storage.lock().entries.clear();

        if self.config.track_metrics {
            self.metrics.reset();
        }
    }

    /// Get the current number of entries, including expired entries not yet
    /// swept
    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.lock();
        self.sweep_expired(&mut storage, now)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        self.metrics.snapshot(size, self.config.max_size, self.config.eviction_policy)
    }

    fn record_miss(&self) {
        if self.config.track_metrics {
            self.metrics.record_miss();
        }
    }

    fn sweep_expired(&self, storage: &mut CacheStorage<K, V>, now: Instant) -> usize {
        let Some(ttl) = self.config.ttl else {
            return 0;
        };

        let before = storage.entries.len();
        storage.entries.retain(|_, entry| !entry.is_expired(Some(ttl), now));
        let removed = before - storage.entries.len();

        if removed > 0 {
            trace!(removed, "Swept expired cache entries");
            if self.config.track_metrics {
                self.metrics.record_expirations(removed as u64);
            }
        }
        removed
    }

    fn evict_one_locked(&self, storage: &mut CacheStorage<K, V>) -> Option<K> {
        let entries = storage.entries.iter();
        let victim = match self.config.eviction_policy {
            EvictionPolicy::LRU => entries.min_by_key(|(_, entry)| entry.tick),
            EvictionPolicy::LFU => entries.min_by_key(|(_, entry)| (entry.access_count, entry.seq)),
            EvictionPolicy::FIFO | EvictionPolicy::TTL => {
                entries.min_by_key(|(_, entry)| entry.seq)
            }
        }
        .map(|(key, _)| key.clone())?;

        if let Some(entry) = storage.entries.remove(&victim) {
            trace!(
                policy = %self.config.eviction_policy,
                access_count = entry.access_count,
                idle_ms = self.clock.elapsed_since(entry.last_accessed).as_millis() as u64,
                "Evicted cache entry"
            );
        }

        if self.config.track_metrics {
            self.metrics.record_eviction();
        }
        Some(victim)
    }
}

impl<K, V, C> Clone for Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
        }
    }
}
