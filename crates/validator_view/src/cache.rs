//! Fixed-capacity least-recently-used cache.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Thread-safe LRU cache with a hard upper bound on resident entries.
///
/// Every operation takes a short mutex and never holds it across an await
/// point. The cache does not coordinate fills: callers that miss
/// concurrently on the same key each fetch and insert, and the last insert
/// wins. Use it only for mappings where every writer stores the same value.
#[derive(Debug)]
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

/// Point-in-time cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// Insert or overwrite `key`.
    ///
    /// Returns the least recently used entry when the insert pushed it out.
    /// Overwriting an existing key never evicts.
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.get_mut(&key) {
            *slot = value;
            return None;
        }
        inner.push(key, value)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            len: inner.len(),
            capacity: inner.cap().get(),
        }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
