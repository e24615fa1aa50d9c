//! Memoization over a bounded cache
//!
//! Successful results are stored under a key derived from the call
//! arguments; errors are never cached. Concurrent misses for the same key
//! each run the inner callable and the last one to finish wins the slot.

use std::fmt;
use std::sync::Arc;

use decorum_common::cache::{derive_key, Cache, CacheConfig, CacheStats};
use decorum_common::error::ConfigResult;
use decorum_common::time::{Clock, SystemClock};
use serde::Serialize;
use tracing::{trace, warn};

use crate::callable::{CallFuture, Callable};

/// Maps call arguments to a cache key; `None` bypasses the cache
pub type KeyFn<A> = Arc<dyn Fn(&A) -> Option<String> + Send + Sync>;

/// Memoizing decorator
pub struct Memoize<A, T, E, C = SystemClock>
where
    T: Clone,
    C: Clock + Clone,
{
    inner: Callable<A, T, E>,
    cache: Cache<String, T, C>,
    key_fn: KeyFn<A>,
}

impl<A, T, E> Memoize<A, T, E, SystemClock>
where
    A: Serialize + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Memoize `inner` with a fresh cache, keying on serialized arguments
    pub fn new(inner: Callable<A, T, E>, config: CacheConfig) -> ConfigResult<Self> {
        Ok(Self::with_cache(inner, Cache::new(config)?))
    }
}

impl<A, T, E, C> Memoize<A, T, E, C>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
    C: Clock + Clone,
{
    /// Memoize `inner` over an existing (possibly shared) cache
    pub fn with_cache(inner: Callable<A, T, E>, cache: Cache<String, T, C>) -> Self
    where
        A: Serialize,
    {
        let key_fn: KeyFn<A> = Arc::new(|args: &A| match derive_key(args) {
            Ok(key) => Some(key),
            Err(error) => {
                warn!(%error, "Arguments cannot be keyed, bypassing cache");
                None
            }
        });
        Self { inner, cache, key_fn }
    }

    /// Memoize `inner` keyed by a caller-supplied function
    ///
    /// Use this for arguments that are not serializable or whose identity is
    /// not their serialized value.
    pub fn with_key_fn<F>(inner: Callable<A, T, E>, cache: Cache<String, T, C>, key_fn: F) -> Self
    where
        F: Fn(&A) -> Option<String> + Send + Sync + 'static,
    {
        Self { inner, cache, key_fn: Arc::new(key_fn) }
    }

    /// Invoke through the cache
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        let Some(key) = (self.key_fn)(&args) else {
            return self.inner.call(args);
        };

        if let Some(value) = self.cache.get(&key) {
            trace!(%key, "Memoize hit");
            return Box::pin(async move { Ok(value) });
        }

        trace!(%key, "Memoize miss");
        let pending = self.inner.call(args);
        let cache = self.cache.clone();
        Box::pin(async move {
            let value = pending.await?;
            cache.put(key, value.clone());
            Ok(value)
        })
    }

    /// A callable that routes through this memoizer
    pub fn callable(&self) -> Callable<A, T, E> {
        let this = self.clone();
        Callable::from_boxed(move |args| this.call(args))
    }

    /// Drop every cached result
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Drop the cached result for `args`, if any
    pub fn invalidate(&self, args: &A) -> bool {
        (self.key_fn)(args).is_some_and(|key| self.cache.remove(&key).is_some())
    }

    /// Cache statistics snapshot
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The underlying cache
    pub fn cache(&self) -> &Cache<String, T, C> {
        &self.cache
    }
}

impl<A, T, E, C> Clone for Memoize<A, T, E, C>
where
    T: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cache: self.cache.clone(),
            key_fn: Arc::clone(&self.key_fn),
        }
    }
}

impl<A, T, E, C> fmt::Debug for Memoize<A, T, E, C>
where
    T: Clone,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoize").field("cache_size", &self.cache.len()).finish_non_exhaustive()
    }
}
