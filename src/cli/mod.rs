//! Command-line interface.
//!
//! ```text
//! pagelib [--content <dir>] [--config <file>] [-v|--verbose] [-q|--quiet] <command>
//!
//!   compile <root> --type <css|js> [--brand <b>] [--run-mode <m>]...
//!   resolve <root> [--brand <b>] [--run-mode <m>]...
//!   graph <root> [--brand <b>]
//!   libraries [--category <c>] [--format text|json]
//!   components [--category <c>]
//!   refresh [--json]
//! ```
//!
//! Command output goes to stdout; logs go to stderr.

mod compile;
mod components;
mod graph;
mod libraries;
mod refresh;
mod resolve;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::LibrarianConfig;
use crate::content::FsContentTree;
use crate::librarian::Librarian;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(
    name = "pagelib",
    about = "Resolve, order and compile front-end libraries for content roots",
    version,
    long_about = "pagelib indexes the library folders and components of a content repository, \
                  resolves which libraries a content subtree needs, orders them by their \
                  dependencies and compiles them into one CSS or JS bundle."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Content repository directory
    #[arg(long, global = true, env = "PAGELIB_CONTENT", default_value = ".")]
    content: PathBuf,

    /// Configuration file (default: ./pagelib.toml, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile the bundle for a content root
    Compile(compile::CompileCommand),
    /// List the libraries a content root resolves to, in order
    Resolve(resolve::ResolveCommand),
    /// Print the component/category/library graph of a root as JSON
    Graph(graph::GraphCommand),
    /// List indexed libraries
    Libraries(libraries::LibrariesCommand),
    /// List registered components
    Components(components::ComponentsCommand),
    /// Rebuild the index and print statistics
    Refresh(refresh::RefreshCommand),
}

/// Flags that override configured values.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Active run mode; repeat for several. Replaces the configured set.
    #[arg(long = "run-mode", value_name = "MODE")]
    pub run_modes: Vec<String>,

    /// Cache compiled bundles in this directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable the bundle cache
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,
}

impl ConfigOverrides {
    /// Apply the flags to a loaded configuration.
    pub fn apply(&self, config: &mut LibrarianConfig) {
        if !self.run_modes.is_empty() {
            config.run_modes = self.run_modes.iter().cloned().collect();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.directory = Some(dir.clone());
            config.cache.enabled = true;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

/// What every command needs to open a librarian.
#[derive(Debug, Clone)]
pub struct Session {
    content: PathBuf,
    config_path: Option<PathBuf>,
}

impl Session {
    /// Load configuration, apply `overrides` and build the librarian.
    pub async fn librarian(&self, overrides: &ConfigOverrides) -> Result<Arc<Librarian>> {
        let mut config = LibrarianConfig::load_or_default(self.config_path.clone()).await?;
        overrides.apply(&mut config);
        tracing::debug!(target: "cli", "Effective configuration: {:?}", config);

        let tree = FsContentTree::new(&self.content)
            .with_context(|| format!("Cannot open content directory {}", self.content.display()))?;
        Librarian::start(config, Arc::new(tree)).await
    }
}

impl Cli {
    /// Log filter for the chosen verbosity: `--verbose` is debug, `--quiet`
    /// is errors only, otherwise `RUST_LOG` or info.
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let session = Session {
            content: self.content,
            config_path: self.config,
        };
        match self.command {
            Commands::Compile(cmd) => cmd.execute(&session).await,
            Commands::Resolve(cmd) => cmd.execute(&session).await,
            Commands::Graph(cmd) => cmd.execute(&session).await,
            Commands::Libraries(cmd) => cmd.execute(&session).await,
            Commands::Components(cmd) => cmd.execute(&session).await,
            Commands::Refresh(cmd) => cmd.execute(&session).await,
        }
    }
}
