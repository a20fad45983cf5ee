//! Shared helpers for pagelib integration tests.

// Not every test binary uses every helper
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use pagelib::test_utils::fixtures::write_sample_site;

/// A sample content repository in a temporary directory.
pub struct TestRepository {
    temp: TempDir,
}

impl TestRepository {
    /// Write the sample site into a fresh temporary directory.
    pub fn sample() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        write_sample_site(&temp.path().join("repo")).context("Failed to write sample site")?;
        Ok(Self { temp })
    }

    /// Root of the content repository.
    pub fn content_dir(&self) -> PathBuf {
        self.temp.path().join("repo")
    }

    /// A scratch directory next to the repository.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Overwrite a file given by its repository path, e.g. `/libs/base/base.css`.
    pub fn write(&self, path: &str, text: &str) -> Result<()> {
        let target = self.content_dir().join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, text).with_context(|| format!("Failed to write {}", target.display()))
    }

    /// Read a file given by its repository path.
    pub fn read(&self, path: &str) -> Result<String> {
        let target = self.content_dir().join(path.trim_start_matches('/'));
        fs::read_to_string(&target).with_context(|| format!("Failed to read {}", target.display()))
    }

    /// A `pagelib` command pointed at this repository.
    ///
    /// Runs in the temp directory with an empty user config directory, so no
    /// stray `pagelib.toml` is picked up; colors and `RUST_LOG` are disabled.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pagelib").expect("pagelib binary");
        cmd.current_dir(self.temp.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("PAGELIB_CONTENT")
            .env("PAGELIB_CONFIG_DIR", self.temp.path().join("user-config"))
            .arg("--content")
            .arg(self.content_dir());
        cmd
    }

    /// Write a configuration file in the working directory of [`command`](Self::command).
    pub fn write_config(&self, text: &str) -> Result<PathBuf> {
        let path = self.temp.path().join("pagelib.toml");
        fs::write(&path, text)?;
        Ok(path)
    }
}

/// Every cached bundle file below `dir`, relative to it, sorted.
pub fn cached_entries(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    entries.sort();
    entries
}
