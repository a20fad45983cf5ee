//! File-system cache store.
//!
//! Layout: `<dir>/<root segments>/<brand>/<type>/library`, so a bundle for
//! `/content/home/jcr:content` lives at
//! `<dir>/content/home/jcr:content/default/css/library`.
//!
//! Every root segment and the brand must be a single plain path component;
//! a key that would resolve outside the cache directory is refused.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::{CacheFilter, CacheKey, CacheStore};
use crate::constants::CACHED_LIBRARY_FILE;
use crate::core::{AssetType, LibraryError, Result};

/// Cache store that keeps one file per entry under a directory.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    /// Use `dir` as the cache directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| LibraryError::caching("create", format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `key`, or `Err(reason)` when the key cannot be stored
    /// inside the cache directory.
    fn entry_path(&self, key: &CacheKey) -> std::result::Result<PathBuf, String> {
        let mut path = self.dir.clone();
        for segment in key.root.split('/').filter(|s| !s.is_empty()) {
            path.push(plain_segment(segment)?);
        }
        path.push(plain_segment(&key.brand)?);
        path.push(key.asset_type.to_string());
        path.push(CACHED_LIBRARY_FILE);
        Ok(path)
    }

    fn key_for(&self, entry: &Path) -> Option<CacheKey> {
        let relative = entry.strip_prefix(&self.dir).ok()?;
        let mut segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.pop()? != CACHED_LIBRARY_FILE {
            return None;
        }
        let asset_type: AssetType = segments.pop()?.parse().ok()?;
        let brand = segments.pop()?;
        let root = format!("/{}", segments.join("/"));
        Some(CacheKey::new(&root, asset_type, Some(&brand)))
    }

    /// Remove now-empty directories between `path` and the cache directory.
    fn prune(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.dir || !dir.starts_with(&self.dir) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key).map_err(|reason| LibraryError::Lookup {
            key: key.to_string(),
            reason,
        })?;
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LibraryError::Lookup {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        let path = self
            .entry_path(key)
            .map_err(|reason| LibraryError::caching("put", format!("{key}: {reason}")))?;
        let put_error = |e: std::io::Error| LibraryError::caching("put", format!("{key}: {e}"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(put_error)?;
        }
        // Readers never see a partial bundle.
        let staging = path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&staging, value).map_err(put_error)?;
        fs::rename(&staging, &path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            put_error(e)
        })?;
        tracing::trace!(target: "cache", "Stored {}", path.display());
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool> {
        let path = self
            .entry_path(key)
            .map_err(|reason| LibraryError::caching("invalidate", format!("{key}: {reason}")))?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune(&path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LibraryError::caching("invalidate", format!("{key}: {e}"))),
        }
    }

    fn delete_matching(&self, filter: &CacheFilter) -> Result<usize> {
        let mut deleted = 0;
        for key in self.keys()? {
            if filter.matches(&key) && self.delete(&key)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn delete_all(&self) -> Result<()> {
        let clear_error = |e: std::io::Error| LibraryError::caching("clear", format!("{}: {e}", self.dir.display()));
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(clear_error(e)),
        }
        fs::create_dir_all(&self.dir).map_err(clear_error)
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| LibraryError::Lookup {
                key: self.dir.display().to_string(),
                reason: e.to_string(),
            })?;
            if entry.file_type().is_file()
                && let Some(key) = self.key_for(entry.path())
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// `segment` if it names exactly one directory entry.
fn plain_segment(segment: &str) -> std::result::Result<&str, String> {
    let mut components = Path::new(segment).components();
    let plain = !segment.contains(['/', '\\'])
        && matches!(components.next(), Some(Component::Normal(name)) if name == segment)
        && components.next().is_none();
    if plain {
        Ok(segment)
    } else {
        Err(format!("'{segment}' is not a plain path segment"))
    }
}
