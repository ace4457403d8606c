//! Gitignore-style path exclusion shared by the scanner and the watcher.

use std::path::Path;

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use super::{HASH_DIR_NAME, INDEX_DIR_NAME};

/// Ignore files read from the repository root, in order.
pub const IGNORE_FILES: &[&str] = &[".gitignore", ".contaxtignore"];

/// Compiled ignore predicate over repository-relative paths.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug)]
pub struct IgnoreSet {
    matcher: Gitignore,
}

impl IgnoreSet {
    /// Build the set from the built-in exclusions plus the repository's
    /// ignore files.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(repo_root);

        for builtin in [INDEX_DIR_NAME, HASH_DIR_NAME] {
            builder
                .add_line(None, builtin)
                .with_context(|| format!("Invalid built-in ignore pattern: {}", builtin))?;
        }

        for name in IGNORE_FILES {
            let path = repo_root.join(name);
            if !path.is_file() {
                continue;
            }
            // Partial errors still leave the valid lines loaded.
            if let Some(e) = builder.add(&path) {
                warn!(file = %path.display(), error = %e, "ignore file has invalid patterns");
            }
            debug!(file = %path.display(), "loaded ignore file");
        }

        let matcher = builder.build().context("Failed to compile ignore rules")?;
        Ok(Self { matcher })
    }

    /// Build a set from literal gitignore lines.
    #[cfg(test)]
    pub fn from_patterns(repo_root: &Path, patterns: &[&str]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(repo_root);
        for pattern in [INDEX_DIR_NAME, HASH_DIR_NAME].iter().chain(patterns) {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("Invalid ignore pattern: {}", pattern))?;
        }
        let matcher = builder.build().context("Failed to compile ignore rules")?;
        Ok(Self { matcher })
    }

    /// True if the relative path, or any directory above it, is ignored.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative_path, false)
            .is_ignore()
    }
}
