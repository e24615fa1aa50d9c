//! Cache statistics
//!
//! Counters are atomics so readers never contend with the entry lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::config::EvictionPolicy;

/// Point-in-time statistics for a cache
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum allowed entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Eviction policy in force
    pub policy: EvictionPolicy,

    /// Lookups that returned a live value
    pub hits: u64,

    /// Lookups that found nothing or an expired entry
    pub misses: u64,

    /// Stores, including replacements of an existing key
    pub inserts: u64,

    /// Entries removed to make room for a new key
    pub evictions: u64,

    /// Entries removed because their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate fill percentage (size / max_size)
    pub fn fill_percentage(&self) -> Option<f64> {
        self.max_size.map(|max| if max == 0 { 0.0 } else { self.size as f64 / max as f64 })
    }

    /// Total number of lookups (hits + misses)
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Shared atomic counters backing [`CacheStats`]
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsCollector {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.counters.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        size: usize,
        max_size: Option<usize>,
        policy: EvictionPolicy,
    ) -> CacheStats {
        CacheStats {
            size,
            max_size,
            policy,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.inserts.store(0, Ordering::Relaxed);
        self.counters.evictions.store(0, Ordering::Relaxed);
        self.counters.expirations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::stats.
    use std::thread;

    use super::*;

    /// Validates rate calculations on a populated snapshot.
    ///
    /// Assertions:
    /// - Ensures `(stats.hit_rate() - 0.8).abs() < 1e-10` evaluates to true.
    /// - Confirms `stats.total_accesses()` equals `100`.
    /// - Confirms `stats.fill_percentage()` equals `Some(0.5)`.
    #[test]
    fn test_rates() {
        let stats = CacheStats {
            size: 50,
            max_size: Some(100),
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert!((stats.hit_rate() - 0.8).abs() < 1e-10);
        assert_eq!(stats.total_accesses(), 100);
        assert_eq!(stats.fill_percentage(), Some(0.5));
    }

    #[test]
    fn test_rates_without_accesses_or_bound() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.fill_percentage(), None);
    }

    /// Validates that clones of a collector share counters.
    ///
    /// Assertions:
    /// - Confirms hits recorded on either handle appear in both snapshots.
    /// - Confirms `reset` zeroes every counter.
    #[test]
    fn test_collector_clone_shares_counters() {
        let collector = MetricsCollector::new();
        let clone = collector.clone();

        collector.record_hit();
        clone.record_hit();
        clone.record_miss();
        collector.record_expirations(3);

        let stats = collector.snapshot(2, Some(4), EvictionPolicy::LFU);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.policy, EvictionPolicy::LFU);

        clone.reset();
        assert_eq!(collector.snapshot(0, None, EvictionPolicy::LRU).hits, 0);
    }

    #[test]
    fn test_collector_thread_safety() {
        let collector = MetricsCollector::new();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let collector = collector.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        collector.record_insert();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(collector.snapshot(0, None, EvictionPolicy::LRU).inserts, 1000);
    }
}
