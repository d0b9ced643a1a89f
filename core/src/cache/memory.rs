//! In-memory LRU store for fetched thumbnail bytes.

use hashlink::LruCache;

use crate::types::{CacheBudget, ThumbnailKey};

/// Encoded image bytes cached for one key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bytes: Vec<u8>,
}

impl CacheEntry {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    fn cost(&self) -> usize {
        self.bytes.len()
    }
}

/// LRU keyed by [`ThumbnailKey`] that evicts once the byte budget is exceeded.
///
/// With [`CacheBudget::unbounded`] nothing is ever evicted.
#[derive(Debug)]
pub struct MemoryCache {
    entries: LruCache<ThumbnailKey, CacheEntry>,
    budget: CacheBudget,
    bytes_used: usize,
}

impl MemoryCache {
    /// Construct a cache with the provided byte budget.
    pub fn new(budget: CacheBudget) -> Self {
        Self { entries: LruCache::new_unbounded(), budget, bytes_used: 0 }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total bytes held by cached entries.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Budget the cache evicts against.
    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    /// Retrieve an entry, refreshing its recency ordering if present.
    pub fn get(&mut self, key: &ThumbnailKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Whether `key` is cached, without touching its recency.
    pub fn contains_key(&self, key: &ThumbnailKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry. Returns `false` when the entry alone exceeds the budget and
    /// was not stored.
    pub fn insert(&mut self, key: ThumbnailKey, entry: CacheEntry) -> bool {
        let cost = entry.cost();
        if cost > self.budget.bytes_max {
            return false;
        }

        if let Some(existing) = self.entries.remove(&key) {
            self.bytes_used = self.bytes_used.saturating_sub(existing.cost());
        }

        self.bytes_used += cost;
        self.entries.insert(key, entry);
        self.evict_if_needed();
        true
    }

    fn evict_if_needed(&mut self) {
        while self.bytes_used > self.budget.bytes_max {
            if let Some((_key, oldest)) = self.entries.remove_lru() {
                self.bytes_used = self.bytes_used.saturating_sub(oldest.cost());
            } else {
                break;
            }
        }
    }
}
