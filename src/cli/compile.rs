//! `pagelib compile`

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;

use super::{ConfigOverrides, Session};
use crate::core::AssetType;

/// Compile the bundle for a content root.
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// Content root, e.g. `/content/site/home`
    pub root: String,

    /// Bundle type
    #[arg(short = 't', long = "type", value_name = "css|js")]
    pub asset_type: AssetType,

    /// Brand; libraries restricted to other brands are left out
    #[arg(short, long)]
    pub brand: Option<String>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

impl CompileCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&self.overrides).await?;
        let bundle = librarian
            .compile(&self.root, self.asset_type, self.brand.as_deref())
            .await
            .with_context(|| format!("Failed to compile {} bundle for {}", self.asset_type, self.root))?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bundle.as_bytes())?;
        if !bundle.is_empty() && !bundle.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        tracing::debug!(target: "cli", "Cache: {}", librarian.cache().stats());
        Ok(())
    }
}
