use indexmap::IndexMap;
use std::hash::Hash;

/// Fixed-capacity cache with least-recently-used eviction.
///
/// Entries are kept in recency order inside an `IndexMap`: index 0 is the least
/// recently used entry and the last index the most recent one. A capacity of 0
/// stores nothing.
#[derive(Clone, Debug)]
pub struct BoundedCache<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
    stats: CacheStats,
}

/// Hit/miss counters for a `BoundedCache`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to go to the backing store.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity.min(4096)),
            capacity,
            stats: CacheStats::default(),
        }
    }

    /// Return a clone of the cached value and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.entries.get_index_of(key) {
            Some(idx) => {
                self.stats.hits = self.stats.hits.saturating_add(1);
                let last = self.entries.len() - 1;
                self.entries.move_index(idx, last);
                self.entries.get_index(last).map(|(_, value)| value.clone())
            }
            None => {
                self.stats.misses = self.stats.misses.saturating_add(1);
                None
            }
        }
    }

    /// Insert or replace `key`, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(idx) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
            if let Some((_, slot)) = self.entries.get_index_mut(last) {
                *slot = value;
            }
            return;
        }
        self.entries.insert(key, value);
        self.enforce_limit();
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub fn get_or_insert_with<F>(&mut self, key: K, load: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = load(&key);
        self.insert(key, value.clone());
        value
    }

    /// Fallible variant of [`BoundedCache::get_or_insert_with`].
    ///
    /// Errors from `load` are returned as-is and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load(&key)?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// True when `key` is cached. Does not change recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Hit/miss/eviction counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn enforce_limit(&mut self) {
        while self.entries.len() > self.capacity {
            if self.entries.shift_remove_index(0).is_none() {
                break;
            }
            self.stats.evictions = self.stats.evictions.saturating_add(1);
        }
    }
}
