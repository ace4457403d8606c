//! Content fingerprints for change detection.
//!
//! One digest per source file, mirrored under the reserved hash directory:
//! ```text
//! <repo>/.hashes/{relative_path}.hash
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use super::HASH_DIR_NAME;

const HASH_EXTENSION: &str = ".hash";

/// Compute the hex digest of raw file bytes.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Persists and compares per-file content fingerprints.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    repo_root: PathBuf,
    hash_dir: PathBuf,
}

impl ContentHasher {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let hash_dir = repo_root.join(HASH_DIR_NAME);
        Self {
            repo_root,
            hash_dir,
        }
    }

    /// Location of the stored fingerprint for a relative path.
    pub fn hash_path(&self, relative_path: &str) -> PathBuf {
        self.hash_dir
            .join(format!("{}{}", relative_path, HASH_EXTENSION))
    }

    /// Read the last recorded digest, if any.
    pub async fn stored(&self, relative_path: &str) -> Option<String> {
        tokio::fs::read_to_string(self.hash_path(relative_path))
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// True only if a stored digest exists and matches the file on disk.
    ///
    /// Any read failure counts as changed.
    pub async fn is_unchanged(&self, relative_path: &str) -> bool {
        let Some(stored) = self.stored(relative_path).await else {
            return false;
        };

        match tokio::fs::read(self.repo_root.join(relative_path)).await {
            Ok(content) => fingerprint(&content) == stored,
            Err(e) => {
                debug!(path = relative_path, error = %e, "cannot read file for fingerprint");
                false
            }
        }
    }

    /// Persist the digest for a relative path.
    pub async fn record(&self, relative_path: &str, digest: &str) -> Result<()> {
        let path = self.hash_path(relative_path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tokio::fs::write(&path, digest)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Remove the stored digest for a relative path, if present.
    pub async fn forget(&self, relative_path: &str) -> Result<()> {
        let path = self.hash_path(relative_path);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    /// Every relative path that has a stored fingerprint, sorted.
    pub fn tracked_paths(&self) -> Vec<String> {
        if !self.hash_dir.is_dir() {
            return Vec::new();
        }

        let mut paths: Vec<String> = WalkDir::new(&self.hash_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| relative_source_path(&self.hash_dir, e.path()))
            .collect();

        paths.sort();
        paths
    }
}

fn relative_source_path(hash_dir: &Path, hash_file: &Path) -> Option<String> {
    let relative = hash_file.strip_prefix(hash_dir).ok()?;
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    relative.strip_suffix(HASH_EXTENSION).map(String::from)
}
