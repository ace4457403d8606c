//! Live file watching.
//!
//! `notify` callbacks push [`ChangeEvent`]s into an unbounded channel. A
//! single drain task consumes them in arrival order and routes each one
//! through the coordinator, so at most one reindex runs at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::coordinator::IndexCoordinator;
use super::ignore_set::IgnoreSet;
use super::provider::Provider;
use super::relative_path;
use super::store::IndexStore;

/// A file that may need reindexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub repo_root: PathBuf,
}

/// Counts from one drain task's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchStats {
    pub processed: usize,
    pub reindexed: usize,
    pub skipped_outside: usize,
    pub skipped_ignored: usize,
    pub skipped_unchanged: usize,
    pub failed: usize,
}

/// Keeps the OS watch alive; dropping it closes the event channel.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Watch `repo_root` recursively, sending content modifications to `tx`.
    pub fn start(repo_root: &Path, tx: UnboundedSender<ChangeEvent>) -> Result<Self> {
        let root = repo_root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for path in queued_paths(&root, &event) {
                        let _ = tx.send(ChangeEvent {
                            path,
                            repo_root: root.clone(),
                        });
                    }
                }
                Err(e) => warn!(error = %e, "watch error"),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(repo_root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", repo_root.display()))?;

        Ok(Self { _watcher: watcher })
    }
}

/// Paths of `event` worth queueing: content modifications only, with any
/// dot-prefixed component under `root` dropped.
pub fn queued_paths(root: &Path, event: &Event) -> Vec<PathBuf> {
    if !matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    ) {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| !is_hidden_under(root, path))
        .cloned()
        .collect()
}

fn is_hidden_under(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.')),
        Err(_) => false,
    }
}

/// Spawn the single consumer of the change queue. The task ends when every
/// sender is dropped and returns what it did.
pub fn spawn_drain<P, S>(
    coordinator: Arc<IndexCoordinator<P, S>>,
    ignore: Arc<IgnoreSet>,
    mut rx: UnboundedReceiver<ChangeEvent>,
) -> JoinHandle<WatchStats>
where
    P: Provider + 'static,
    S: IndexStore + 'static,
{
    tokio::spawn(async move {
        let mut stats = WatchStats::default();
        while let Some(event) = rx.recv().await {
            stats.processed += 1;
            handle_event(&coordinator, &ignore, &event, &mut stats).await;
        }
        debug!(processed = stats.processed, "change queue closed");
        stats
    })
}

async fn handle_event<P: Provider, S: IndexStore>(
    coordinator: &IndexCoordinator<P, S>,
    ignore: &IgnoreSet,
    event: &ChangeEvent,
    stats: &mut WatchStats,
) {
    let Some(rel) = relative_path(&event.repo_root, &event.path) else {
        debug!(path = %event.path.display(), "outside repository, skipping");
        stats.skipped_outside += 1;
        return;
    };

    if ignore.is_ignored(&rel) {
        debug!(path = %rel, "ignored");
        stats.skipped_ignored += 1;
        return;
    }

    if coordinator.is_current(&rel).await {
        debug!(path = %rel, "unchanged");
        stats.skipped_unchanged += 1;
        return;
    }

    match coordinator.reindex_file(&rel).await {
        Ok(report) => {
            info!(path = %rel, chunks = report.chunks, "reindexed after change");
            stats.reindexed += 1;
        }
        Err(e) => {
            warn!(path = %rel, error = %e, "failed to reindex changed file");
            stats.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::annotator::{Annotator, RetryPolicy};
    use crate::local::provider::ProviderError;
    use crate::local::testing::{FakeProvider, MemoryStore};
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    type TestCoordinator = IndexCoordinator<FakeProvider, MemoryStore>;

    async fn coordinator(root: &Path) -> Arc<TestCoordinator> {
        let coordinator = IndexCoordinator::new(
            root,
            MemoryStore::new(),
            Annotator::new(FakeProvider::new(4), RetryPolicy::default(), 2000),
        );
        coordinator.ensure_store().await.unwrap();
        Arc::new(coordinator)
    }

    fn event(root: &Path, rel: &str) -> ChangeEvent {
        ChangeEvent {
            path: root.join(rel),
            repo_root: root.to_path_buf(),
        }
    }

    async fn drain(
        coordinator: Arc<TestCoordinator>,
        ignore: IgnoreSet,
        events: Vec<ChangeEvent>,
    ) -> WatchStats {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_drain(coordinator, Arc::new(ignore), rx);
        for event in events {
            tx.send(event).unwrap();
        }
        drop(tx);
        handle.await.unwrap()
    }

    #[tokio::test]
    async fn test_events_drain_in_order_and_repeat_is_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let coordinator = coordinator(dir.path()).await;
        let ignore = IgnoreSet::from_patterns(dir.path(), &[]).unwrap();

        let stats = drain(
            Arc::clone(&coordinator),
            ignore,
            vec![
                event(dir.path(), "a.txt"),
                event(dir.path(), "b.txt"),
                event(dir.path(), "a.txt"),
            ],
        )
        .await;

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.reindexed, 2);
        assert_eq!(stats.skipped_unchanged, 1);
        assert_eq!(
            coordinator.store().inserted_paths(),
            vec!["a.txt", "a.txt", "b.txt", "b.txt"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_queued_during_a_reindex_wait_their_turn() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let coordinator = coordinator(dir.path()).await;
        let provider = coordinator.annotator().provider();
        // A's first annotation backs off, holding the drain inside A.
        provider.script_complete(Err(ProviderError::RateLimited));
        let ignore = Arc::new(IgnoreSet::from_patterns(dir.path(), &[]).unwrap());

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_drain(Arc::clone(&coordinator), ignore, rx);
        tx.send(event(dir.path(), "a.txt")).unwrap();
        while provider.complete_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(coordinator.store().inserted_paths().is_empty());

        tx.send(event(dir.path(), "b.txt")).unwrap();
        tx.send(event(dir.path(), "a.txt")).unwrap();
        drop(tx);
        let stats = handle.await.unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.reindexed, 2);
        assert_eq!(stats.skipped_unchanged, 1);
        assert_eq!(
            coordinator.store().inserted_paths(),
            vec!["a.txt", "a.txt", "b.txt", "b.txt"]
        );
    }

    #[tokio::test]
    async fn test_ignored_and_outside_paths_are_skipped() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(dir.path().join("trace.log"), "noise").unwrap();
        std::fs::write(outside.path().join("x.rs"), "fn x() {}").unwrap();
        let coordinator = coordinator(dir.path()).await;
        let ignore = IgnoreSet::from_patterns(dir.path(), &["*.log"]).unwrap();

        let stats = drain(
            Arc::clone(&coordinator),
            ignore,
            vec![
                event(dir.path(), "trace.log"),
                ChangeEvent {
                    path: outside.path().join("x.rs"),
                    repo_root: dir.path().to_path_buf(),
                },
            ],
        )
        .await;

        assert_eq!(stats.skipped_ignored, 1);
        assert_eq!(stats.skipped_outside, 1);
        assert_eq!(coordinator.annotator().provider().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_drain() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let coordinator = coordinator(dir.path()).await;
        coordinator
            .annotator()
            .provider()
            .script_embed(Err(ProviderError::failure("boom")));
        let ignore = IgnoreSet::from_patterns(dir.path(), &[]).unwrap();

        let stats = drain(
            Arc::clone(&coordinator),
            ignore,
            vec![
                event(dir.path(), "a.txt"),
                event(dir.path(), "b.txt"),
                event(dir.path(), "missing.txt"),
            ],
        )
        .await;

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.reindexed, 1);
        assert_eq!(coordinator.store().records_for("b.txt").len(), 2);
    }

    #[test]
    fn test_only_content_modifications_are_queued() {
        let root = Path::new("/repo");
        let file = root.join("src/lib.rs");

        let data = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        let any = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(file.clone());
        let metadata = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)))
            .add_path(file.clone());
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());

        assert_eq!(queued_paths(root, &data), vec![file.clone()]);
        assert_eq!(queued_paths(root, &any), vec![file]);
        assert!(queued_paths(root, &metadata).is_empty());
        assert!(queued_paths(root, &create).is_empty());
    }

    #[test]
    fn test_dot_prefixed_paths_are_dropped() {
        let root = Path::new("/home/me/.projects/repo");
        let modified = || Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)));

        let git = modified().add_path(root.join(".git/index"));
        let hashes = modified().add_path(root.join(".hashes/a.rs.hash"));
        let visible = modified().add_path(root.join("src/a.rs"));

        assert!(queued_paths(root, &git).is_empty());
        assert!(queued_paths(root, &hashes).is_empty());
        assert_eq!(queued_paths(root, &visible), vec![root.join("src/a.rs")]);
    }
}
