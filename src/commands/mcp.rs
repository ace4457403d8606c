//! MCP command - run as an MCP server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::local::{self, LocalConfig};

#[derive(Args)]
pub struct McpCmd {
    /// Repository to serve (default: last used, else current directory)
    pub path: Option<PathBuf>,
}

impl McpCmd {
    pub async fn run(&self) -> Result<()> {
        // Logging to stderr (stdout is for MCP protocol)
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let config = LocalConfig::load()?;
        let root = super::repo_root(self.path.as_deref(), &config)?;
        let coordinator = local::open_coordinator(&root, &config).await?;
        coordinator
            .ensure_store()
            .await
            .context("Failed to create vector store")?;

        local::mcp::run_local(Arc::new(coordinator)).await
    }
}
