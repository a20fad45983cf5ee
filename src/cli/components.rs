//! `pagelib components`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use super::{ConfigOverrides, Session};
use crate::component::DependentComponent;

/// List registered components.
#[derive(Args, Debug)]
pub struct ComponentsCommand {
    /// Only components depending on this category
    #[arg(short, long)]
    pub category: Option<String>,
}

impl ComponentsCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&ConfigOverrides::default()).await?;
        let snapshot = librarian.snapshot().await;
        let index = snapshot.components();
        let components: Vec<Arc<DependentComponent>> = match &self.category {
            Some(category) => index.components_for_category(category),
            None => index.components().to_vec(),
        };

        if components.is_empty() {
            println!("{}", "No components found".yellow());
            return Ok(());
        }
        for component in components {
            print!("{} {}", component.resource_type.bold(), component.path.dimmed());
            if let Some(from) = &component.inherited_from {
                print!(" (inherited from {from})");
            }
            println!();
            println!("  dependencies: {}", component.dependencies.join(", "));
            for embedded in &component.embedded_components {
                println!("  embeds {} at {}", embedded.resource_type, embedded.relative_path);
            }
        }
        if index.skipped_descriptors() > 0 {
            tracing::warn!(
                target: "cli",
                "{} malformed embed descriptors were skipped",
                index.skipped_descriptors()
            );
        }
        Ok(())
    }
}
