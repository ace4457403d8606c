//! Clean command - remove the index and fingerprints.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::local::{HASH_DIR_NAME, INDEX_DIR_NAME, LocalConfig};

#[derive(Args)]
pub struct CleanCmd {
    /// Repository (default: last used, else current directory)
    pub path: Option<PathBuf>,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl CleanCmd {
    pub async fn run(&self) -> Result<()> {
        let config = LocalConfig::load()?;
        let root = super::repo_root(self.path.as_deref(), &config)?;

        let targets: Vec<PathBuf> = [INDEX_DIR_NAME, HASH_DIR_NAME]
            .iter()
            .map(|name| root.join(name))
            .filter(|dir| dir.exists())
            .collect();

        if targets.is_empty() {
            println!("Nothing to clean in {}.", root.display());
            return Ok(());
        }

        if !self.yes {
            println!("This will delete:");
            for dir in &targets {
                println!("  {}", dir.display());
            }
            print!("Continue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Aborted.");
                return Ok(());
            }
        }

        for dir in &targets {
            tokio::fs::remove_dir_all(dir)
                .await
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            println!("Removed {}", dir.display());
        }

        Ok(())
    }
}
