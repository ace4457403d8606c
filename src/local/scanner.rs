//! Startup scan of the whole repository.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::coordinator::IndexCoordinator;
use super::ignore_set::IgnoreSet;
use super::provider::Provider;
use super::relative_path;
use super::store::IndexStore;

/// Counts from one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub indexed: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// Walks the repository once and feeds new or changed files to the
/// coordinator, one at a time.
pub struct RepositoryScanner<P, S> {
    coordinator: Arc<IndexCoordinator<P, S>>,
    ignore: Arc<IgnoreSet>,
}

impl<P: Provider, S: IndexStore> RepositoryScanner<P, S> {
    pub fn new(coordinator: Arc<IndexCoordinator<P, S>>, ignore: Arc<IgnoreSet>) -> Self {
        Self {
            coordinator,
            ignore,
        }
    }

    /// Index every file whose fingerprint is missing or stale, then prune
    /// records of files that no longer exist or are now ignored.
    ///
    /// Per-file failures are logged and counted; the scan always runs to the
    /// end, so an interrupted or partly failed scan resumes on the next run.
    pub async fn scan_and_index(&self) -> Result<ScanReport> {
        self.coordinator
            .ensure_store()
            .await
            .context("Failed to create vector store")?;

        let mut report = ScanReport::default();
        let files = self.collect_files(&mut report);
        info!(files = files.len(), ignored = report.ignored, "scanning repository");

        for path in files {
            if self.coordinator.is_current(&path).await {
                debug!(path = %path, "unchanged, skipping");
                report.skipped += 1;
                continue;
            }

            match self.coordinator.reindex_file(&path).await {
                Ok(_) => report.indexed += 1,
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to index file");
                    report.failed += 1;
                }
            }
        }

        report.pruned = self.prune().await;

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            pruned = report.pruned,
            "scan complete"
        );
        Ok(report)
    }

    fn collect_files(&self, report: &mut ScanReport) -> Vec<String> {
        let root = self.coordinator.repo_root();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_path(root, entry.path()) else {
                continue;
            };
            if self.ignore.is_ignored(&rel) {
                report.ignored += 1;
                continue;
            }
            files.push(rel);
        }

        files
    }

    /// Forget every tracked file that is gone from disk or now ignored.
    async fn prune(&self) -> usize {
        let root: &Path = self.coordinator.repo_root();
        let mut pruned = 0;

        for path in self.coordinator.hasher().tracked_paths() {
            if root.join(&path).is_file() && !self.ignore.is_ignored(&path) {
                continue;
            }
            match self.coordinator.forget_file(&path).await {
                Ok(_) => pruned += 1,
                Err(e) => warn!(path = %path, error = %e, "failed to prune file"),
            }
        }

        pruned
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
