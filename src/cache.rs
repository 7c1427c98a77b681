//! Optional memoization of materialized datasets.
//!
//! Keys are a content hash of the raw input bytes plus the parse parameters
//! that influence the result, so identical uploads skip re-parsing. The
//! cache has a fixed capacity with first-in first-out eviction and is never
//! required for correctness; the engine runs identically with it disabled.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::CsvDialect;
use crate::dataset::Dataset;

pub type CacheKey = [u8; 32];

/// Computes the cache key for one input.
pub fn cache_key(bytes: &[u8], extension: &str, dialect: &CsvDialect) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    hasher.update(extension.as_bytes());
    hasher.update([0u8, dialect.delimiter]);
    hasher.update(dialect.encoding.as_bytes());
    hasher.finalize().into()
}

/// Fixed-capacity FIFO cache of parsed datasets.
pub struct ParseCache {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<Dataset>>,
    order: VecDeque<CacheKey>,
}

impl ParseCache {
    /// Creates a cache holding at most `capacity` datasets. A capacity of
    /// zero disables insertion entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Dataset>> {
        self.entries.get(key).map(Arc::clone)
    }

    pub fn insert(&mut self, key: CacheKey, dataset: Arc<Dataset>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(key, dataset);
        self.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(tag: &str) -> Arc<Dataset> {
        Arc::new(Dataset::new(vec![tag.into()], vec![]))
    }

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let dialect = CsvDialect::default();
        assert_eq!(
            cache_key(b"a,b\n1,2\n", ".csv", &dialect),
            cache_key(b"a,b\n1,2\n", ".csv", &dialect)
        );
    }

    #[test]
    fn keys_depend_on_bytes_extension_and_dialect() {
        let dialect = CsvDialect::default();
        let base = cache_key(b"a,b\n", ".csv", &dialect);

        assert_ne!(base, cache_key(b"a,b\nx\n", ".csv", &dialect));
        assert_ne!(base, cache_key(b"a,b\n", ".xlsx", &dialect));
        assert_ne!(
            base,
            cache_key(b"a,b\n", ".csv", &CsvDialect::default().delimiter(b';'))
        );
        assert_ne!(
            base,
            cache_key(b"a,b\n", ".csv", &CsvDialect::default().encoding("latin-1"))
        );
    }

    #[test]
    fn get_returns_inserted_dataset() {
        let mut cache = ParseCache::new(4);
        let key = cache_key(b"x", ".csv", &CsvDialect::default());

        assert!(cache.get(&key).is_none());
        cache.insert(key, dataset("x"));

        let hit = cache.get(&key).expect("hit");
        assert_eq!(hit.header(), &["x".to_string()]);
    }

    #[test]
    fn eviction_is_first_in_first_out() {
        let mut cache = ParseCache::new(2);
        let dialect = CsvDialect::default();
        let k1 = cache_key(b"1", ".csv", &dialect);
        let k2 = cache_key(b"2", ".csv", &dialect);
        let k3 = cache_key(b"3", ".csv", &dialect);

        cache.insert(k1, dataset("1"));
        cache.insert(k2, dataset("2"));
        cache.insert(k3, dataset("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none(), "oldest entry must be evicted");
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn zero_capacity_never_stores() {
        let mut cache = ParseCache::new(0);
        let key = cache_key(b"x", ".csv", &CsvDialect::default());
        cache.insert(key, dataset("x"));
        assert!(cache.is_empty());
    }
}
