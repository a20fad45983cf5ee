use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{CacheFilter, CacheKey, CacheStore, MemoryCacheStore};
use crate::content::{is_within, normalize};
use crate::core::{AssetType, LibraryError, Result};

/// Counters for one [`CacheManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups that returned a bundle
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Bundles written
    pub writes: u64,
    /// Entries removed by invalidation or clearing
    pub invalidated: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, `0.0` when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits, {} misses ({:.0}%), {} writes, {} invalidated",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.writes,
            self.invalidated
        )
    }
}

/// Typed access to a [`CacheStore`].
///
/// A disabled manager never reads or writes; lookups always miss.
#[derive(Debug)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    invalidated: AtomicU64,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }
}

impl CacheManager {
    /// Manage `store`.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// A manager that caches nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether bundles are read from and written to the store.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Look up a compiled bundle.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Lookup`] when the store faults or holds non-UTF-8 bytes.
    pub fn cached_library(
        &self,
        root: &str,
        asset_type: AssetType,
        brand: Option<&str>,
    ) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        let key = CacheKey::new(root, asset_type, brand);
        let Some(bytes) = self.store.get(&key)? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(target: "cache", "Miss {}", key);
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| LibraryError::Lookup {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(target: "cache", "Hit {}", key);
        Ok(Some(text))
    }

    /// Store a compiled bundle.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Caching`] when the store faults.
    pub fn cache_library(
        &self,
        root: &str,
        asset_type: AssetType,
        brand: Option<&str>,
        text: &str,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = CacheKey::new(root, asset_type, brand);
        self.store.put(&key, text.as_bytes().to_vec())?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(target: "cache", "Stored {} ({} bytes)", key, text.len());
        Ok(())
    }

    /// Remove every bundle whose root lies under `prefix`, optionally
    /// restricted to one type and brand. Returns the number removed.
    pub fn invalidate_cache(
        &self,
        prefix: &str,
        asset_type: Option<AssetType>,
        brand: Option<&str>,
    ) -> Result<usize> {
        let filter = CacheFilter::under(prefix)
            .with_asset_type(asset_type)
            .with_brand(brand);
        let removed = self.store.delete_matching(&filter)?;
        self.note_invalidated(removed);
        debug!(target: "cache", "Invalidated {} entries under {}", removed, filter.prefix);
        Ok(removed)
    }

    /// Remove every bundle whose content covers `path`: roots at or above it
    /// and roots below it.
    pub fn invalidate_containing(&self, path: &str) -> Result<usize> {
        let path = normalize(path);
        let mut removed = 0;
        for key in self.store.keys()? {
            if (is_within(&path, &key.root) || is_within(&key.root, &path)) && self.store.delete(&key)? {
                removed += 1;
            }
        }
        self.note_invalidated(removed);
        debug!(target: "cache", "Invalidated {} entries covering {}", removed, path);
        Ok(removed)
    }

    /// Remove everything.
    pub fn clear_cache(&self) -> Result<()> {
        let count = self.store.keys().map(|keys| keys.len()).unwrap_or_default();
        self.store.delete_all()?;
        self.note_invalidated(count);
        debug!(target: "cache", "Cleared {} entries", count);
        Ok(())
    }

    /// Counters so far.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
        }
    }

    fn note_invalidated(&self, count: usize) {
        self.invalidated.fetch_add(count as u64, Ordering::Relaxed);
    }
}
