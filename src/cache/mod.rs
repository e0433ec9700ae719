//! Kernel row cache
//!
//! The SMO solver reads whole rows of the Q matrix. Rows are expensive to
//! compute (one kernel evaluation per training instance), so the most
//! recently used ones are kept in an LRU cache bounded by a memory budget.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Fewest rows kept regardless of the memory budget; SMO touches two per step
const MIN_ROWS: usize = 2;

/// LRU cache of Q-matrix rows
pub struct KernelCache {
    cache: LruCache<usize, Arc<[f64]>>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(MIN_ROWS)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache sized from a budget in megabytes for rows of `row_len` values
    pub fn with_memory_limit(megabytes: f64, row_len: usize) -> Self {
        let bytes = (megabytes.max(0.0) * 1024.0 * 1024.0) as usize;
        let row_bytes = row_len.max(1) * std::mem::size_of::<f64>();
        Self::new(bytes / row_bytes)
    }

    /// Get row `i`, computing it with `fill` on a miss
    pub fn get_or_insert_with<F>(&mut self, i: usize, fill: F) -> Arc<[f64]>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.cache.get(&i) {
            self.hits += 1;
            return Arc::clone(row);
        }

        self.misses += 1;
        let row: Arc<[f64]> = fill().into();
        self.cache.put(i, Arc::clone(&row));
        row
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }

}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_cache_basic() {
        let mut cache = KernelCache::new(3);

        let row = cache.get_or_insert_with(0, || vec![1.0, 2.0]);
        assert_eq!(&row[..], &[1.0, 2.0]);
        assert_eq!(cache.stats().misses, 1);

        let again = cache.get_or_insert_with(0, || panic!("row should be cached"));
        assert_eq!(&again[..], &[1.0, 2.0]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_kernel_cache_lru_eviction() {
        let mut cache = KernelCache::new(2);

        cache.get_or_insert_with(0, || vec![0.0]);
        cache.get_or_insert_with(1, || vec![1.0]);
        cache.get_or_insert_with(2, || vec![2.0]); // Should evict row 0

        cache.get_or_insert_with(2, || panic!("row 2 should be cached"));
        let mut recomputed = false;
        cache.get_or_insert_with(0, || {
            recomputed = true;
            vec![0.0]
        });
        assert!(recomputed);
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_hit_rate_calculation() {
        let mut cache = KernelCache::new(10);
        assert_eq!(cache.hit_rate(), 0.0);

        cache.get_or_insert_with(0, || vec![1.0]);
        cache.get_or_insert_with(0, || vec![1.0]);
        cache.get_or_insert_with(0, || vec![1.0]);
        cache.get_or_insert_with(5, || vec![5.0]);

        // 2 hits, 2 misses
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_cache_with_memory_limit() {
        // 1 MB of 1024-value rows is 128 rows
        let cache = KernelCache::with_memory_limit(1.0, 1024);
        assert_eq!(cache.stats().capacity, 128);

        let tiny = KernelCache::with_memory_limit(0.0, 1024);
        assert_eq!(tiny.stats().capacity, MIN_ROWS);
    }
}
