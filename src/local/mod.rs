//! Local mode - a self-contained index inside the repository.
//!
//! Stores state next to the code:
//! - `.index/` - LanceDB table of chunk records
//! - `.hashes/` - one fingerprint file per indexed source file

mod annotator;
mod config;
mod coordinator;
mod hasher;
mod ignore_set;
pub mod mcp;
mod models;
mod provider;
mod scanner;
mod search;
mod store;
mod vector;
mod watcher;

#[cfg(test)]
mod testing;

pub use config::{API_KEY_ENV, LocalConfig};
pub use hasher::ContentHasher;
pub use ignore_set::IgnoreSet;
pub use provider::OpenAiProvider;
pub use scanner::RepositoryScanner;
pub use search::{LocalSearch, save_answer};
pub use store::{IndexStore, StoreError};
pub use vector::VectorStore;
pub use watcher::{ChangeWatcher, spawn_drain};

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

use annotator::Annotator;
use coordinator::IndexCoordinator;

/// The name of the vector index directory.
pub const INDEX_DIR_NAME: &str = ".index";

/// The name of the fingerprint directory.
pub const HASH_DIR_NAME: &str = ".hashes";

/// Coordinator wired to the OpenAI provider and the LanceDB store.
pub type LiveCoordinator = IndexCoordinator<OpenAiProvider, VectorStore>;

/// Canonicalize `path` and check it is a git working tree.
pub fn resolve_repo(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Repository not found: {}", path.display()))?;

    if !root.join(".git").exists() {
        bail!("{} is not a git repository", root.display());
    }
    Ok(root)
}

/// Build the live coordinator for a repository.
pub async fn open_coordinator(repo_root: &Path, config: &LocalConfig) -> Result<LiveCoordinator> {
    let provider = OpenAiProvider::from_config(config)?;
    let store = VectorStore::open(&repo_root.join(INDEX_DIR_NAME), config.embedding_dimensions)
        .await
        .context("Failed to open vector store")?;
    let annotator = Annotator::new(provider, config.retry_policy(), config.max_tokens);

    Ok(IndexCoordinator::new(repo_root, store, annotator))
}

/// `path` relative to `root`, with `/` separators. `None` if `path` is not
/// strictly under `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
