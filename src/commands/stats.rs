//! Stats command - show index statistics.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use walkdir::WalkDir;

use crate::local::{
    ContentHasher, HASH_DIR_NAME, INDEX_DIR_NAME, IndexStore, LocalConfig, VectorStore,
};

#[derive(Args)]
pub struct StatsCmd {
    /// Repository (default: last used, else current directory)
    pub path: Option<PathBuf>,
}

impl StatsCmd {
    pub async fn run(&self) -> Result<()> {
        let config = LocalConfig::load()?;
        let root = super::repo_root(self.path.as_deref(), &config)?;
        let index_dir = root.join(INDEX_DIR_NAME);
        let hash_dir = root.join(HASH_DIR_NAME);

        if !index_dir.exists() {
            println!("No index found in {}. Run `contaxt index` first.", root.display());
            return Ok(());
        }

        let store = VectorStore::open(&index_dir, config.embedding_dimensions)
            .await
            .context("Failed to open vector store")?;
        let records = store.count().await?;
        let tracked = ContentHasher::new(&root).tracked_paths().len();

        let index_size = dir_size(&index_dir);
        let hash_size = dir_size(&hash_dir);

        println!("Repository: {}", root.display());
        println!();
        println!("Files:       {}", tracked);
        println!("Records:     {}", records);
        println!();
        println!("Storage:");
        println!("  Index:     {}", format_size(index_size));
        println!("  Hashes:    {}", format_size(hash_size));
        println!("  Total:     {}", format_size(index_size + hash_size));

        Ok(())
    }
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
