//! Reindex command - force one file through the indexing pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::local::{self, LocalConfig};

#[derive(Args)]
pub struct ReindexCmd {
    /// File to reindex
    pub file: PathBuf,

    /// Repository (default: last used, else current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,
}

impl ReindexCmd {
    pub async fn run(&self) -> Result<()> {
        let config = LocalConfig::load()?;
        let root = super::repo_root(self.repo.as_deref(), &config)?;

        let file = if self.file.is_absolute() {
            self.file.clone()
        } else {
            std::env::current_dir()?.join(&self.file)
        };
        let file = file
            .canonicalize()
            .with_context(|| format!("File not found: {}", self.file.display()))?;
        let rel = local::relative_path(&root, &file)
            .with_context(|| format!("{} is not inside {}", file.display(), root.display()))?;

        let coordinator = local::open_coordinator(&root, &config).await?;
        coordinator.ensure_store().await?;
        let report = coordinator.reindex_file(&rel).await?;

        println!(
            "Reindexed {}: {} chunks, {} stale records removed (sha256 {})",
            report.path,
            report.chunks,
            report.stale_removed,
            &report.digest[..report.digest.len().min(12)]
        );
        if report.degraded_explanations > 0 {
            println!(
                "{} records were stored without an explanation",
                report.degraded_explanations
            );
        }

        Ok(())
    }
}
