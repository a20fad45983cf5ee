//! In-process cache store.

use dashmap::DashMap;

use super::{CacheFilter, CacheKey, CacheStore};
use crate::core::Result;

/// Cache store backed by a [`DashMap`]. Never faults.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<CacheKey, Vec<u8>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn delete_matching(&self, filter: &CacheFilter) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !filter.matches(key));
        Ok(before.saturating_sub(self.entries.len()))
    }

    fn delete_all(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}
