//! Search command - find the records closest to a query.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::local::{self, LocalConfig, LocalSearch};

#[derive(Args)]
pub struct SearchCmd {
    /// Natural language query
    pub query: String,

    /// Max results
    #[arg(short, long, default_value = "5", value_parser = super::positive_limit())]
    pub limit: usize,

    /// Show the stored explanation of each result
    #[arg(short, long)]
    pub explain: bool,

    /// Repository (default: last used, else current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,
}

impl SearchCmd {
    pub async fn run(&self) -> Result<()> {
        let config = LocalConfig::load()?;
        let root = super::repo_root(self.repo.as_deref(), &config)?;
        let coordinator = Arc::new(local::open_coordinator(&root, &config).await?);

        let start = std::time::Instant::now();
        let results = LocalSearch::new(coordinator)
            .search(&self.query, self.limit)
            .await?;
        let elapsed = start.elapsed().as_millis();

        println!("Found {} results in {}ms\n", results.len(), elapsed);

        for (i, r) in results.iter().enumerate() {
            println!("{}. {} (score: {:.2})", i + 1, r.path, r.score);
            if self.explain && !r.explanation.is_empty() {
                for line in r.explanation.lines() {
                    println!("   {}", line);
                }
                println!("   ---");
            }
            let snippet = r.text.lines().take(5).collect::<Vec<_>>().join("\n   ");
            println!("   {}", snippet);
            println!();
        }

        Ok(())
    }
}
