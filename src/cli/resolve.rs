//! `pagelib resolve`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{ConfigOverrides, Session};

/// List the libraries a content root resolves to, dependencies first.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Content root
    pub root: String,

    /// Brand
    #[arg(short, long)]
    pub brand: Option<String>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

impl ResolveCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&self.overrides).await?;
        let libraries = librarian.resolve(&self.root, self.brand.as_deref()).await?;

        if libraries.is_empty() {
            eprintln!("{}", format!("No libraries required by {}", self.root).yellow());
            return Ok(());
        }
        for library in libraries {
            let categories: Vec<&str> = library.categories().iter().map(String::as_str).collect();
            println!("{} [{}]", library.path(), categories.join(", ").dimmed());
        }
        Ok(())
    }
}
