//! Ask command - answer a question grounded in the closest records.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::local::{self, LocalConfig, LocalSearch, save_answer};

#[derive(Args)]
pub struct AskCmd {
    /// Question about the repository
    pub query: String,

    /// Records handed to the model as context
    #[arg(short, long, default_value = "5", value_parser = super::positive_limit())]
    pub limit: usize,

    /// Also write the answer to this path, relative to the repository
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Repository (default: last used, else current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,
}

impl AskCmd {
    pub async fn run(&self) -> Result<()> {
        let config = LocalConfig::load()?;
        let root = super::repo_root(self.repo.as_deref(), &config)?;
        let coordinator = Arc::new(local::open_coordinator(&root, &config).await?);
        let search = LocalSearch::new(coordinator);

        let results = search.search(&self.query, self.limit).await?;
        for (i, r) in results.iter().enumerate() {
            println!("{}: {}", i + 1, r.path);
            if !r.explanation.is_empty() {
                println!("{}", r.explanation);
            }
            println!();
        }

        let answer = search.answer(&self.query, &results).await?;
        println!("=> {}", answer);

        if let Some(path) = &self.save {
            let written = save_answer(&root, path, &answer)?;
            println!("\nResults saved to {}", written.display());
        }

        Ok(())
    }
}
