//! `pagelib refresh`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{ConfigOverrides, Session};

/// Rebuild the index and print statistics.
#[derive(Args, Debug)]
pub struct RefreshCommand {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

impl RefreshCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let librarian = session.librarian(&ConfigOverrides::default()).await?;
        let snapshot = librarian.refresh().await?;
        let statistics = snapshot.statistics();

        if self.json {
            println!("{}", serde_json::to_string_pretty(statistics)?);
        } else {
            println!("{} {}", "Index rebuilt:".green().bold(), statistics);
        }
        Ok(())
    }
}
