//! Local search service.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use super::annotator::Outcome;
use super::coordinator::IndexCoordinator;
use super::models::SearchResult;
use super::provider::Provider;
use super::store::IndexStore;

/// Records returned when no limit is given.
pub const DEFAULT_TOP_K: usize = 5;

const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful coding assistant. Respond with just clear and concise code and don't give any explanations based on the user's query and the provided context.";

/// Nearest-record lookup and grounded answers over the local index.
///
/// Reads go through the coordinator's store and annotator; this type never
/// mutates the index.
pub struct LocalSearch<P, S> {
    coordinator: Arc<IndexCoordinator<P, S>>,
}

impl<P: Provider, S: IndexStore> LocalSearch<P, S> {
    pub fn new(coordinator: Arc<IndexCoordinator<P, S>>) -> Self {
        Self { coordinator }
    }

    /// Embed `query` and return the `top_k` closest records.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let vector = match self.coordinator.annotator().embed(query).await {
            Outcome::Ok(vector) => vector,
            Outcome::Degraded { reason } => bail!("Failed to embed query: {}", reason),
        };

        let hits = self
            .coordinator
            .store()
            .query_by_vector(&vector, top_k)
            .await
            .context("Vector search failed")?;

        Ok(hits.into_iter().map(SearchResult::from).collect())
    }

    /// Ask the completion model to answer `query` from `results`.
    pub async fn answer(&self, query: &str, results: &[SearchResult]) -> Result<String> {
        let prompt = answer_prompt(query, results);
        match self
            .coordinator
            .annotator()
            .complete(ANSWER_SYSTEM_PROMPT, &prompt)
            .await
        {
            Outcome::Ok(answer) => Ok(answer),
            Outcome::Degraded { reason } => bail!("Failed to generate answer: {}", reason),
        }
    }
}

fn answer_prompt(query: &str, results: &[SearchResult]) -> String {
    let context = results
        .iter()
        .map(|r| format!("// {}\n\n {}", r.path, r.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("User Query: {}\n\nProject Context: {}", query, context)
        .trim()
        .to_string()
}

/// Write `answer` to `relative_path` under the repository, creating parent
/// directories. Paths that would escape the repository are rejected.
pub fn save_answer(repo_root: &Path, relative_path: &Path, answer: &str) -> Result<PathBuf> {
    if !relative_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!(
            "Refusing to write outside the repository: {}",
            relative_path.display()
        );
    }

    let target = repo_root.join(relative_path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&target, answer)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    Ok(target)
}
