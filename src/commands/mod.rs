//! CLI command implementations.

mod ask;
mod clean;
mod config;
mod index;
mod mcp;
mod reindex;
mod search;
mod stats;
mod watch;

pub use ask::AskCmd;
pub use clean::CleanCmd;
pub use config::ConfigCmd;
pub use index::IndexCmd;
pub use mcp::McpCmd;
pub use reindex::ReindexCmd;
pub use search::SearchCmd;
pub use stats::StatsCmd;
pub use watch::WatchCmd;

use std::path::{Path, PathBuf};

use clap::builder::RangedU64ValueParser;
use tracing::warn;

use crate::local::{self, LocalConfig};

/// Resolve the repository from an explicit path, else the last one used,
/// else the current directory.
fn repo_root(path: Option<&Path>, config: &LocalConfig) -> anyhow::Result<PathBuf> {
    let path = path
        .or(config.repo_path.as_deref())
        .unwrap_or(Path::new("."));
    local::resolve_repo(path)
}

/// Result limits start at one.
fn positive_limit() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

/// Persist `root` as the last repository used.
fn remember_repo(config: &mut LocalConfig, root: &Path) {
    if config.repo_path.as_deref() == Some(root) {
        return;
    }
    config.repo_path = Some(root.to_path_buf());
    if let Err(e) = config.save() {
        warn!(error = %e, "failed to save repository path");
    }
}
