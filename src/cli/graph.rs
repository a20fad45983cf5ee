//! `pagelib graph`

use anyhow::Result;
use clap::Args;

use super::{ConfigOverrides, Session};

/// Print the component/category/library graph of a root as JSON.
#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Content root
    pub root: String,

    /// Brand
    #[arg(short, long)]
    pub brand: Option<String>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

impl GraphCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&self.overrides).await?;
        let export = librarian.graph_export(&self.root, self.brand.as_deref()).await?;
        println!("{}", export.to_json()?);
        Ok(())
    }
}
