//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{
    AskCmd, CleanCmd, ConfigCmd, IndexCmd, McpCmd, ReindexCmd, SearchCmd, StatsCmd, WatchCmd,
};

#[derive(Parser)]
#[command(name = "contaxt")]
#[command(about = "contaxt - ask questions about your repository, grounded in its code")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index new and changed files of a repository
    Index(IndexCmd),

    /// Index, then reindex files as they change
    Watch(WatchCmd),

    /// Search the index
    Search(SearchCmd),

    /// Answer a question using the closest indexed code
    Ask(AskCmd),

    /// Reindex a single file
    Reindex(ReindexCmd),

    /// Show index statistics
    Stats(StatsCmd),

    /// Delete the index and stored fingerprints
    Clean(CleanCmd),

    /// Run as MCP server (for AI tools)
    Mcp(McpCmd),

    /// Manage configuration (API keys, models, etc.)
    Config(ConfigCmd),
}

impl Command {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Command::Index(cmd) => cmd.run().await,
            Command::Watch(cmd) => cmd.run().await,
            Command::Search(cmd) => cmd.run().await,
            Command::Ask(cmd) => cmd.run().await,
            Command::Reindex(cmd) => cmd.run().await,
            Command::Stats(cmd) => cmd.run().await,
            Command::Clean(cmd) => cmd.run().await,
            Command::Mcp(cmd) => cmd.run().await,
            Command::Config(cmd) => cmd.run().await,
        }
    }
}
