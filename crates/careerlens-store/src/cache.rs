//! Age-bounded result cache using [`moka`].
//!
//! Entries are never expired by the cache itself.  The caller passes a
//! maximum age on every read; entries at least that old are reported as
//! absent and left untouched.  The only eviction is the LRU capacity bound.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Default number of entries a cache holds before evicting.
const DEFAULT_MAX_CAPACITY: u64 = 1024;

// ── cache stats ──────────────────────────────────────────────────────

/// Live lookup counters shared by clones of a cache.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a cache's lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    /// Reads that returned a fresh value.
    pub hits: u64,
    /// Reads for keys that were never stored (or were evicted).
    pub misses: u64,
    /// Reads that found an entry at least as old as the requested maximum.
    pub stale: u64,
}

impl CacheSnapshot {
    /// Total lookups.
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.stale
    }

    /// Hit rate between 0.0 and 1.0 (0.0 if no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} stale={} rate={:.2}%",
            self.hits,
            self.misses,
            self.stale,
            self.hit_rate() * 100.0,
        )
    }
}

// ── cache ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct CachedEntry<T> {
    data: T,
    stored_at: Instant,
}

/// A keyed cache of payloads with caller-supplied freshness bounds.
///
/// Freshness is strict: an entry is returned only while its age is below
/// `max_age`, so a `max_age` of zero never hits.
pub struct ResultCache<T> {
    name: &'static str,
    inner: Cache<String, Arc<CachedEntry<T>>>,
    stats: Arc<CacheStats>,
}

impl<T> Clone for ResultCache<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: self.inner.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> fmt::Debug for ResultCache<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("name", &self.name)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl<T> ResultCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start building a new cache.
    pub fn builder(name: &'static str) -> ResultCacheBuilder<T> {
        ResultCacheBuilder {
            name,
            max_capacity: DEFAULT_MAX_CAPACITY,
            _marker: std::marker::PhantomData,
        }
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, data: T) {
        let key = key.into();
        debug!(cache = self.name, key = %key, "cache insert");
        self.inner.insert(
            key,
            Arc::new(CachedEntry {
                data,
                stored_at: Instant::now(),
            }),
        );
    }

    /// Return the value for `key` if it is younger than `max_age`.
    ///
    /// Reading never mutates or removes the entry.
    pub fn get(&self, key: &str, max_age: Duration) -> Option<T> {
        let Some(entry) = self.inner.get(key) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key, "cache miss");
            return None;
        };

        let age = entry.stored_at.elapsed();
        if age >= max_age {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            debug!(
                cache = self.name,
                key,
                age_secs = age.as_secs_f64(),
                "cached entry is too old"
            );
            return None;
        }

        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        debug!(
            cache = self.name,
            key,
            age_secs = age.as_secs_f64(),
            "cache hit"
        );
        Some(entry.data.clone())
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lookup counters.
    pub fn stats(&self) -> CacheSnapshot {
        self.stats.snapshot()
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`ResultCache`].
pub struct ResultCacheBuilder<T> {
    name: &'static str,
    max_capacity: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T> ResultCacheBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Maximum number of entries before the least recently used is evicted.
    pub fn max_capacity(mut self, cap: u64) -> Self {
        self.max_capacity = cap;
        self
    }

    /// Build the cache.
    pub fn build(self) -> ResultCache<T> {
        let inner = Cache::builder()
            .max_capacity(self.max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        debug!(
            name = self.name,
            max_capacity = self.max_capacity,
            "result cache created"
        );

        ResultCache {
            name: self.name,
            inner,
            stats: Arc::new(CacheStats::default()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
