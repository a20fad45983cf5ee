//! Compiled-bundle cache.
//!
//! A compiled bundle is a pure function of the index state and the content
//! under its root, so it can be cached by `(root, asset type, brand)` and
//! thrown away whenever either input changes.
//!
//! # Architecture
//!
//! - [`CacheKey`] / [`CacheFilter`]: what is stored and what an invalidation targets
//! - [`CacheStore`]: the byte-blob store, an external collaborator with two
//!   adapters, [`MemoryCacheStore`] (`DashMap`) and [`FsCacheStore`] (files)
//! - [`CacheManager`]: typed access, hit/miss accounting and the invalidation
//!   operations driven by change events
//!
//! # Per-key states
//!
//! ```text
//!            compile ok
//!   absent ─────────────▶ cached
//!      ▲                    │
//!      └────────────────────┘
//!       invalidate(prefix) / clear
//! ```
//!
//! Concurrent writers for the same key are last-writer-wins; every writer
//! stores the same text for the same index state.
//!
//! # Faults
//!
//! Read faults surface as [`LibraryError::Lookup`] and write or delete faults
//! as [`LibraryError::Caching`]. Neither is fatal to a compile.

mod fs;
mod manager;
mod memory;

pub use fs::FsCacheStore;
pub use manager::{CacheManager, CacheStats};
pub use memory::MemoryCacheStore;

use serde::Serialize;
use std::fmt;

use crate::constants::DEFAULT_BRAND;
use crate::content::{is_within, normalize};
use crate::core::{AssetType, Result};

/// Identifies one cached bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    /// Canonical compilation root
    pub root: String,
    /// Bundle type
    pub asset_type: AssetType,
    /// Brand; `default` when the request named none
    pub brand: String,
}

impl CacheKey {
    /// Create a key. `None` brand maps to the reserved `default` brand.
    ///
    /// ```
    /// use pagelib::cache::CacheKey;
    /// use pagelib::core::AssetType;
    ///
    /// let key = CacheKey::new("/content/home/jcr:content", AssetType::Css, None);
    /// assert_eq!(key.to_string(), "/content/home/jcr:content/default/css");
    /// ```
    pub fn new(root: &str, asset_type: AssetType, brand: Option<&str>) -> Self {
        Self {
            root: normalize(root),
            asset_type,
            brand: brand.unwrap_or(DEFAULT_BRAND).to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root.trim_end_matches('/');
        write!(f, "{}/{}/{}", root, self.brand, self.asset_type)
    }
}

/// Selects cache entries by root prefix and, optionally, type and brand.
///
/// Prefix matching is segment aware: `/a/b` selects `/a/b` and `/a/b/c` but
/// not `/a/bc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFilter {
    /// Root prefix
    pub prefix: String,
    /// Restrict to one asset type
    pub asset_type: Option<AssetType>,
    /// Restrict to one brand
    pub brand: Option<String>,
}

impl CacheFilter {
    /// Every entry whose root lies under `prefix`.
    pub fn under(prefix: &str) -> Self {
        Self {
            prefix: normalize(prefix),
            asset_type: None,
            brand: None,
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self::under("/")
    }

    /// Restrict to one asset type.
    #[must_use]
    pub const fn with_asset_type(mut self, asset_type: Option<AssetType>) -> Self {
        self.asset_type = asset_type;
        self
    }

    /// Restrict to one brand.
    #[must_use]
    pub fn with_brand(mut self, brand: Option<&str>) -> Self {
        self.brand = brand.map(str::to_string);
        self
    }

    /// Whether `key` is selected.
    pub fn matches(&self, key: &CacheKey) -> bool {
        is_within(&key.root, &self.prefix)
            && self.asset_type.is_none_or(|t| t == key.asset_type)
            && self.brand.as_ref().is_none_or(|b| *b == key.brand)
    }
}

/// Keyed byte-blob store for compiled bundles.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Read an entry. Faults are [`LibraryError::Lookup`](crate::core::LibraryError::Lookup).
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Write an entry, replacing any previous value.
    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()>;

    /// Delete one entry. Returns whether it existed.
    fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Delete every entry selected by `filter`. Returns the number deleted.
    fn delete_matching(&self, filter: &CacheFilter) -> Result<usize>;

    /// Delete everything.
    fn delete_all(&self) -> Result<()>;

    /// Every stored key.
    fn keys(&self) -> Result<Vec<CacheKey>>;
}
