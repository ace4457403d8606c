//! Index command - scan the repository and index new or changed files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::local::{self, IgnoreSet, LocalConfig, RepositoryScanner};

#[derive(Args)]
pub struct IndexCmd {
    /// Repository to index (default: last used, else current directory)
    pub path: Option<PathBuf>,
}

impl IndexCmd {
    pub async fn run(&self) -> Result<()> {
        let mut config = LocalConfig::load()?;
        let root = super::repo_root(self.path.as_deref(), &config)?;
        super::remember_repo(&mut config, &root);

        println!("Indexing repository at {}...", root.display());

        let coordinator = Arc::new(local::open_coordinator(&root, &config).await?);
        let ignore = Arc::new(IgnoreSet::load(&root)?);
        let start = std::time::Instant::now();
        let report = RepositoryScanner::new(coordinator, ignore)
            .scan_and_index()
            .await?;

        println!(
            "Indexed {} files, {} unchanged, {} ignored, {} failed, {} removed ({:.1}s)",
            report.indexed,
            report.skipped,
            report.ignored,
            report.failed,
            report.pruned,
            start.elapsed().as_secs_f64()
        );
        if report.failed > 0 {
            println!("Failed files are retried on the next run.");
        }

        Ok(())
    }
}
