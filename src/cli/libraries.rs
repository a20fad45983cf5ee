//! `pagelib libraries`

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::sync::Arc;

use super::{ConfigOverrides, Session};
use crate::library::Library;

/// Output format for listings.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON array
    Json,
}

/// List indexed libraries.
#[derive(Args, Debug)]
pub struct LibrariesCommand {
    /// Only libraries carrying this category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl LibrariesCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&ConfigOverrides::default()).await?;
        let libraries: Vec<Arc<Library>> = match &self.category {
            Some(category) => match librarian.libraries_for_category(category).await {
                Ok(libraries) => libraries,
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(target: "cli", "{}", e);
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            },
            None => librarian.snapshot().await.all_libraries().to_vec(),
        };

        match self.format {
            OutputFormat::Json => {
                let libraries: Vec<&Library> = libraries.iter().map(AsRef::as_ref).collect();
                println!("{}", serde_json::to_string_pretty(&libraries)?);
            }
            OutputFormat::Text => print_text(&libraries),
        }
        Ok(())
    }
}

fn print_text(libraries: &[Arc<Library>]) {
    if libraries.is_empty() {
        println!("{}", "No libraries found".yellow());
        return;
    }
    for library in libraries {
        let categories: Vec<&str> = library.categories().iter().map(String::as_str).collect();
        println!("{}", library.path().bold());
        println!("  categories: {}", categories.join(", "));
        if !library.dependencies().is_empty() {
            println!("  dependencies: {}", library.dependencies().join(", "));
        }
        if !library.embedded_categories().is_empty() {
            println!("  embed: {}", library.embedded_categories().join(", "));
        }
        if !library.conditional_dependencies().is_empty() {
            println!("  conditional: {}", library.conditional_dependencies().join(", "));
        }
        if !library.run_mode_groups().is_empty() {
            let groups: Vec<String> = library.run_mode_groups().iter().map(ToString::to_string).collect();
            println!("  run modes: {}", groups.join(", "));
        }
        if !library.brands().is_empty() {
            let brands: Vec<&str> = library.brands().iter().map(String::as_str).collect();
            println!("  brands: {}", brands.join(", "));
        }
    }
}
