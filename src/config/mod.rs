//! Librarian configuration.
//!
//! Configuration lives in a TOML file: `--config <file>`, else `pagelib.toml`
//! in the working directory, else the per-user file (see
//! [`LibrarianConfig::user_config_path`]). Every field has a default, so an
//! empty or missing file is valid.
//!
//! ```toml
//! library_roots = ["/apps", "/etc", "/libs"]
//! components_root = "/apps"
//! run_modes = ["publish"]
//!
//! [cache]
//! enabled = true
//! directory = "/var/cache/pagelib"   # omit for an in-memory cache
//!
//! [preprocessor]
//! less_command = ["lessc", "-"]
//! sass_command = ["sass", "--stdin"]
//! detect = false                      # fill missing commands from PATH
//! ```
//!
//! Command-line flags override loaded values; see [`crate::cli`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::cache::{CacheManager, CacheStore, FsCacheStore, MemoryCacheStore};
use crate::constants::CONFIG_FILE_NAME;
use crate::preprocessor::CommandPreprocessor;

fn default_library_roots() -> Vec<String> {
    vec!["/apps".to_string(), "/etc".to_string(), "/libs".to_string()]
}

fn default_components_root() -> String {
    "/apps".to_string()
}

fn default_run_modes() -> BTreeSet<String> {
    BTreeSet::from(["publish".to_string()])
}

const fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarianConfig {
    /// Subtrees scanned for library folders
    #[serde(default = "default_library_roots")]
    pub library_roots: Vec<String>,

    /// Root under which component definitions live. A component's resource
    /// type is its path relative to this root.
    #[serde(default = "default_components_root")]
    pub components_root: String,

    /// Active run modes
    #[serde(default = "default_run_modes")]
    pub run_modes: BTreeSet<String>,

    /// Compiled-bundle cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// External LESS/Sass commands
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            library_roots: default_library_roots(),
            components_root: default_components_root(),
            run_modes: default_run_modes(),
            cache: CacheConfig::default(),
            preprocessor: PreprocessorConfig::default(),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether compiled bundles are cached at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for the file-system store; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

impl CacheConfig {
    /// Build the cache manager these settings describe.
    pub fn manager(&self) -> Result<CacheManager> {
        if !self.enabled {
            return Ok(CacheManager::disabled());
        }
        let store: Arc<dyn CacheStore> = match &self.directory {
            Some(dir) => Arc::new(
                FsCacheStore::new(dir)
                    .with_context(|| format!("Failed to open cache directory {}", dir.display()))?,
            ),
            None => Arc::new(MemoryCacheStore::new()),
        };
        Ok(CacheManager::new(store))
    }
}

/// Preprocessor command lines. A missing command passes sources through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Command reading LESS on stdin and writing CSS to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_command: Option<Vec<String>>,

    /// Command reading SCSS/Sass on stdin and writing CSS to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sass_command: Option<Vec<String>>,

    /// Look up `lessc` and `sass` on `PATH` for syntaxes without a command
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub detect: bool,
}

impl PreprocessorConfig {
    /// Build the preprocessor these settings describe.
    pub fn preprocessor(&self) -> CommandPreprocessor {
        let preprocessor = CommandPreprocessor::new(self.less_command.clone(), self.sass_command.clone());
        if self.detect {
            preprocessor.or_detected()
        } else {
            preprocessor
        }
    }
}

impl LibrarianConfig {
    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this structure.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        tracing::debug!(target: "config", "Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given. Otherwise try `pagelib.toml` in the
    /// working directory, then [`user_config_path`](Self::user_config_path).
    /// A file that does not exist yields the defaults.
    pub async fn load_or_default(path: Option<PathBuf>) -> Result<Self> {
        let candidates: Vec<PathBuf> = match path {
            Some(path) => vec![path],
            None => std::iter::once(PathBuf::from(CONFIG_FILE_NAME))
                .chain(Self::user_config_path())
                .collect(),
        };
        for path in &candidates {
            if fs::try_exists(path).await.unwrap_or(false) {
                return Self::load_from(path).await;
            }
        }
        tracing::debug!(target: "config", "No config found in {:?}, using defaults", candidates);
        Ok(Self::default())
    }

    /// Per-user configuration file, e.g. `~/.config/pagelib/pagelib.toml`.
    ///
    /// `PAGELIB_CONFIG_DIR` replaces the platform configuration directory.
    pub fn user_config_path() -> Option<PathBuf> {
        let dir = match std::env::var_os("PAGELIB_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()?.join("pagelib"),
        };
        Some(dir.join(CONFIG_FILE_NAME))
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
