//! Watch command - index the repository, then reindex files as they change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;

use crate::local::{self, ChangeWatcher, IgnoreSet, LocalConfig, RepositoryScanner};

#[derive(Args)]
pub struct WatchCmd {
    /// Repository to watch (default: last used, else current directory)
    pub path: Option<PathBuf>,
}

impl WatchCmd {
    pub async fn run(&self) -> Result<()> {
        let mut config = LocalConfig::load()?;
        let root = super::repo_root(self.path.as_deref(), &config)?;
        super::remember_repo(&mut config, &root);

        let coordinator = Arc::new(local::open_coordinator(&root, &config).await?);
        let ignore = Arc::new(IgnoreSet::load(&root)?);

        // The scan finishes before any live event is consumed.
        println!("Indexing repository at {}...", root.display());
        let report = RepositoryScanner::new(Arc::clone(&coordinator), Arc::clone(&ignore))
            .scan_and_index()
            .await?;
        println!(
            "Indexed {} files, {} unchanged, {} failed",
            report.indexed, report.skipped, report.failed
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = ChangeWatcher::start(&root, tx)?;
        let drain = local::spawn_drain(coordinator, ignore, rx);

        println!("Watching {} for changes...", root.display());
        println!("Press Ctrl+C to stop.\n");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        println!("\nStopping watch.");

        // Dropping the watcher closes the queue; the drain finishes what is
        // already queued.
        drop(watcher);
        let stats = drain.await.context("Watch task panicked")?;

        println!(
            "Reindexed {} files, {} unchanged, {} ignored, {} failed",
            stats.reindexed, stats.skipped_unchanged, stats.skipped_ignored, stats.failed
        );

        Ok(())
    }
}
