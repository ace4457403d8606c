//! Local MCP server implementation.

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    transport::io::stdio,
};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::search::{DEFAULT_TOP_K, LocalSearch};
use super::{LiveCoordinator, OpenAiProvider, VectorStore, relative_path};

/// Local MCP server for repository search.
pub struct LocalMcpServer {
    search: LocalSearch<OpenAiProvider, VectorStore>,
    coordinator: Arc<LiveCoordinator>,
    // Tool calls may arrive concurrently; reindexing stays one file at a time.
    reindex_lock: Mutex<()>,
    tool_router: ToolRouter<LocalMcpServer>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchCodeInput {
    /// The search query - describe what code you're looking for
    pub query: String,
    /// Maximum results to return (default: 5)
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Include the explanation stored with each result
    #[serde(default)]
    pub include_explanation: bool,
}

fn default_limit() -> u32 {
    DEFAULT_TOP_K as u32
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReindexFileInput {
    /// File path relative to the repository root
    pub path: String,
}

#[tool_router]
impl LocalMcpServer {
    pub fn new(coordinator: Arc<LiveCoordinator>) -> Self {
        Self {
            search: LocalSearch::new(Arc::clone(&coordinator)),
            coordinator,
            reindex_lock: Mutex::new(()),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Search the indexed repository using semantic search. Returns the closest code chunks with their file paths."
    )]
    async fn search_code(
        &self,
        Parameters(input): Parameters<SearchCodeInput>,
    ) -> Result<CallToolResult, McpError> {
        match self.search.search(&input.query, input.limit.max(1) as usize).await {
            Ok(results) => {
                if results.is_empty() {
                    return Ok(CallToolResult::success(vec![Content::text(
                        "No results found. Try a different query or run `contaxt index` first.",
                    )]));
                }

                let mut output = String::new();
                for (i, r) in results.iter().enumerate() {
                    output.push_str(&format!("{}. {} (score {:.3})\n", i + 1, r.path, r.score));
                    if input.include_explanation && !r.explanation.is_empty() {
                        output.push_str(&format!("   {}\n", r.explanation));
                    }
                    output.push_str("   ```\n");
                    for line in r.text.lines() {
                        output.push_str(&format!("   {}\n", line));
                    }
                    output.push_str("   ```\n\n");
                }

                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Search failed: {:#}",
                e
            ))])),
        }
    }

    #[tool(
        description = "Reindex one file of the repository so search reflects its current content."
    )]
    async fn reindex_file(
        &self,
        Parameters(input): Parameters<ReindexFileInput>,
    ) -> Result<CallToolResult, McpError> {
        let root = self.coordinator.repo_root();
        let Some(rel) = relative_path(root, &root.join(&input.path)) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Invalid path '{}': must be relative to the repository root",
                input.path
            ))]));
        };

        let _guard = self.reindex_lock.lock().await;
        if self.coordinator.is_current(&rel).await {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "{} is already up to date",
                rel
            ))]));
        }

        match self.coordinator.reindex_file(&rel).await {
            Ok(report) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Reindexed {} ({} chunks, {} stale records removed)",
                rel, report.chunks, report.stale_removed
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to reindex {}: {}",
                rel, e
            ))])),
        }
    }
}

#[tool_handler]
impl ServerHandler for LocalMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "contaxt".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Retrieval over the local repository index. Tools: search_code, reindex_file."
                    .to_string(),
            ),
        }
    }
}

/// Run the local MCP server over stdio.
pub async fn run_local(coordinator: Arc<LiveCoordinator>) -> Result<()> {
    tracing::info!(repo = %coordinator.repo_root().display(), "starting MCP server");
    let server = LocalMcpServer::new(coordinator);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
