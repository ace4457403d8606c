//! Per-file reindex transaction.
//!
//! For one file:
//! 1. Read and redact the content
//! 2. Delete every existing record for the path in one batched update
//! 3. Annotate, embed and insert one record per chunk
//! 4. Annotate, embed and insert the whole-file record
//! 5. Record the content fingerprint
//!
//! Step 5 only runs when 1-4 succeeded, so a failed file is retried from
//! scratch by the next scan or watch cycle. The coordinator holds no lock:
//! callers must not reindex the same path concurrently.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::indexer::{Chunker, IndexError, redact_data_uris};

use super::annotator::{Annotator, Outcome, embedding_text};
use super::hasher::{ContentHasher, fingerprint};
use super::models::{IndexRecord, RecordMetadata};
use super::provider::Provider;
use super::store::{IndexStore, StoreError};

/// Result of reindexing one file.
#[derive(Debug, Clone)]
pub struct ReindexReport {
    pub path: String,
    /// Chunk records written (excludes the whole-file record).
    pub chunks: usize,
    /// Records removed from the previous version.
    pub stale_removed: usize,
    /// Records written with an empty explanation because annotation degraded.
    pub degraded_explanations: usize,
    pub digest: String,
}

#[cfg(test)]
impl ReindexReport {
    /// Total records now stored for the path.
    pub fn records(&self) -> usize {
        self.chunks + 1
    }
}

/// Owns every mutation of the vector store.
pub struct IndexCoordinator<P, S> {
    repo_root: PathBuf,
    store: S,
    annotator: Annotator<P>,
    hasher: ContentHasher,
    chunker: Chunker,
}

impl<P: Provider, S: IndexStore> IndexCoordinator<P, S> {
    pub fn new(repo_root: impl Into<PathBuf>, store: S, annotator: Annotator<P>) -> Self {
        let repo_root = repo_root.into();
        let hasher = ContentHasher::new(repo_root.clone());
        Self {
            repo_root,
            store,
            annotator,
            hasher,
            chunker: Chunker::new(),
        }
    }

    /// Create the store's table if needed.
    pub async fn ensure_store(&self) -> Result<(), StoreError> {
        self.store.ensure_created().await
    }

    /// True if the file's stored fingerprint matches its content.
    pub async fn is_current(&self, relative_path: &str) -> bool {
        self.hasher.is_unchanged(relative_path).await
    }

    /// Replace every record of `relative_path` with records for its current
    /// content, then commit the fingerprint.
    pub async fn reindex_file(&self, relative_path: &str) -> Result<ReindexReport, IndexError> {
        let file = self.repo_root.join(relative_path);
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| IndexError::io(&file, e))?;
        let digest = fingerprint(&bytes);
        let raw = String::from_utf8_lossy(&bytes);
        let content = redact_data_uris(&raw);

        let stale_removed = self.invalidate(relative_path).await?;

        let chunks = self.chunker.chunk_file(relative_path, &content);
        let mut degraded_explanations = 0;

        for chunk in &chunks {
            debug!(path = %chunk.source_path, ordinal = chunk.ordinal, "indexing chunk");
            if !self
                .add_record(relative_path, &chunk.text, Some(&content))
                .await?
            {
                degraded_explanations += 1;
            }
        }

        debug!(path = relative_path, "indexing whole file");
        if !self.add_record(relative_path, &content, None).await? {
            degraded_explanations += 1;
        }

        self.hasher
            .record(relative_path, &digest)
            .await
            .map_err(IndexError::Fingerprint)?;

        info!(
            path = relative_path,
            chunks = chunks.len(),
            stale_removed,
            "file indexed"
        );

        Ok(ReindexReport {
            path: relative_path.to_string(),
            chunks: chunks.len(),
            stale_removed,
            degraded_explanations,
            digest,
        })
    }

    /// Remove every record and the fingerprint of a file that no longer
    /// exists. Returns the number of records removed.
    pub async fn forget_file(&self, relative_path: &str) -> Result<usize, IndexError> {
        let removed = self.invalidate(relative_path).await?;
        self.hasher
            .forget(relative_path)
            .await
            .map_err(IndexError::Fingerprint)?;

        info!(path = relative_path, removed, "file removed from index");
        Ok(removed)
    }

    /// Delete all records whose path matches, as one batched update.
    async fn invalidate(&self, relative_path: &str) -> Result<usize, StoreError> {
        let existing = self.store.query_by_path(relative_path).await?;
        if existing.is_empty() {
            return Ok(0);
        }

        self.store.begin_update().await?;
        let mut deleted = Ok(());
        for record in &existing {
            if let Err(e) = self.store.delete_by_id(&record.id).await {
                deleted = Err(e);
                break;
            }
        }
        // Always close the update so the store is not left mid-batch.
        let ended = self.store.end_update().await;
        deleted?;
        ended?;

        debug!(path = relative_path, removed = existing.len(), "stale records deleted");
        Ok(existing.len())
    }

    /// Annotate, embed and insert one record. Returns false if the record was
    /// stored without an explanation.
    async fn add_record(
        &self,
        relative_path: &str,
        text: &str,
        parent: Option<&str>,
    ) -> Result<bool, IndexError> {
        let (explanation, explained) = match self.annotator.annotate(text, parent).await {
            Outcome::Ok(explanation) => (explanation, true),
            Outcome::Degraded { reason } => {
                warn!(path = relative_path, %reason, "no explanation, indexing without one");
                (String::new(), false)
            }
        };

        let vector = match self
            .annotator
            .embed(&embedding_text(relative_path, &explanation, text))
            .await
        {
            Outcome::Ok(vector) => vector,
            Outcome::Degraded { reason } => {
                return Err(IndexError::Embedding {
                    path: relative_path.to_string(),
                    reason,
                });
            }
        };

        self.store
            .insert(IndexRecord {
                vector,
                metadata: RecordMetadata {
                    path: relative_path.to_string(),
                    text: text.to_string(),
                    explanation,
                },
            })
            .await?;

        Ok(explained)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn annotator(&self) -> &Annotator<P> {
        &self.annotator
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::annotator::RetryPolicy;
    use crate::local::provider::ProviderError;
    use crate::local::testing::{FakeProvider, MemoryStore};
    use tempfile::tempdir;

    async fn coordinator(root: &Path) -> IndexCoordinator<FakeProvider, MemoryStore> {
        let coordinator = IndexCoordinator::new(
            root,
            MemoryStore::new(),
            Annotator::new(FakeProvider::new(4), RetryPolicy::default(), 2000),
        );
        coordinator.ensure_store().await.unwrap();
        coordinator
    }

    fn lines(count: usize, boundary_at: &[usize]) -> String {
        (1..=count)
            .map(|n| {
                if boundary_at.contains(&n) {
                    format!("if (x > {}) {{", n)
                } else {
                    format!("line {}", n)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn provider(c: &IndexCoordinator<FakeProvider, MemoryStore>) -> &FakeProvider {
        c.annotator().provider()
    }

    #[tokio::test]
    async fn test_reindex_foo_txt_end_to_end() {
        let dir = tempdir().unwrap();
        let content = lines(25, &[12]);
        std::fs::write(dir.path().join("foo.txt"), &content).unwrap();
        let c = coordinator(dir.path()).await;

        let report = c.reindex_file("foo.txt").await.unwrap();

        assert_eq!(report.chunks, 2);
        assert_eq!(report.records(), 3);
        let records = c.store().records_for("foo.txt");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].metadata.text.split('\n').count(), 12);
        assert_eq!(records[1].metadata.text.split('\n').count(), 13);
        assert_eq!(records[2].metadata.text, content);

        let stored = std::fs::read_to_string(dir.path().join(".hashes/foo.txt.hash")).unwrap();
        assert_eq!(stored, fingerprint(content.as_bytes()));
        assert!(c.is_current("foo.txt").await);
    }

    #[tokio::test]
    async fn test_embedding_text_combines_path_explanation_and_content() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def a():\n    return 1").unwrap();
        let c = coordinator(dir.path()).await;
        provider(&c).script_complete(Ok("Returns one.".to_string()));

        c.reindex_file("a.py").await.unwrap();

        let inputs = provider(&c).embed_inputs();
        assert_eq!(
            inputs[0],
            "File Path: a.py\nContent Description: Returns one.\nFile Content: def a():\n    return 1"
        );
    }

    #[tokio::test]
    async fn test_chunk_annotation_gets_file_context_whole_file_does_not() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        let c = coordinator(dir.path()).await;

        c.reindex_file("a.py").await.unwrap();

        let prompts = provider(&c).complete_prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("file: x = 1"));
        assert!(prompts[1].starts_with("code:"));
    }

    #[tokio::test]
    async fn test_shrinking_file_leaves_no_stale_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.js");
        std::fs::write(&path, lines(40, &[12, 25])).unwrap();
        std::fs::write(dir.path().join("other.js"), "const y = 2;").unwrap();
        let c = coordinator(dir.path()).await;

        c.reindex_file("app.js").await.unwrap();
        c.reindex_file("other.js").await.unwrap();
        assert_eq!(c.store().records_for("app.js").len(), 4);

        std::fs::write(&path, lines(5, &[])).unwrap();
        let report = c.reindex_file("app.js").await.unwrap();

        assert_eq!(report.stale_removed, 4);
        assert_eq!(c.store().records_for("app.js").len(), 2);
        assert_eq!(c.store().records_for("other.js").len(), 2);
    }

    #[tokio::test]
    async fn test_empty_file_gets_whole_file_record_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        let c = coordinator(dir.path()).await;

        let report = c.reindex_file("empty.txt").await.unwrap();

        assert_eq!(report.chunks, 0);
        let records = c.store().records_for("empty.txt");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.text, "");
    }

    #[tokio::test]
    async fn test_store_failure_leaves_fingerprint_unset() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.txt"), lines(25, &[12])).unwrap();
        let c = coordinator(dir.path()).await;
        c.store().fail_inserts_after(1);

        let err = c.reindex_file("foo.txt").await.unwrap_err();

        assert!(matches!(err, IndexError::Store(_)));
        assert!(c.hasher().stored("foo.txt").await.is_none());
        assert!(!c.is_current("foo.txt").await);
        // The partial insert stays until the next successful attempt.
        assert_eq!(c.store().records_for("foo.txt").len(), 1);

        c.store().clear_failure();
        c.reindex_file("foo.txt").await.unwrap();
        assert_eq!(c.store().records_for("foo.txt").len(), 3);
        assert!(c.is_current("foo.txt").await);
    }

    #[tokio::test]
    async fn test_degraded_explanation_is_indexed_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let c = coordinator(dir.path()).await;
        provider(&c).script_complete(Err(ProviderError::failure("server error")));

        let report = c.reindex_file("a.rs").await.unwrap();

        assert_eq!(report.degraded_explanations, 1);
        let records = c.store().records_for("a.rs");
        assert_eq!(records[0].metadata.explanation, "");
        assert!(provider(&c).embed_inputs()[0].contains("Content Description: \n"));
        assert!(c.is_current("a.rs").await);
    }

    #[tokio::test]
    async fn test_degraded_embedding_aborts_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let c = coordinator(dir.path()).await;
        provider(&c).script_embed(Err(ProviderError::failure("bad request")));

        let err = c.reindex_file("a.rs").await.unwrap_err();

        assert!(matches!(err, IndexError::Embedding { .. }));
        assert!(c.hasher().stored("a.rs").await.is_none());
    }

    #[tokio::test]
    async fn test_data_uris_are_redacted_before_indexing() {
        let dir = tempdir().unwrap();
        let raw = "# Logo\n![logo](data:image/png;base64,AAAA)\n";
        std::fs::write(dir.path().join("README.md"), raw).unwrap();
        let c = coordinator(dir.path()).await;

        let report = c.reindex_file("README.md").await.unwrap();

        let records = c.store().records_for("README.md");
        assert!(records.iter().all(|r| !r.metadata.text.contains("base64")));
        assert!(records[0].metadata.text.contains("placeholder-image"));
        // The fingerprint covers the raw bytes, not the redacted text.
        assert_eq!(report.digest, fingerprint(raw.as_bytes()));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let c = coordinator(dir.path()).await;

        let err = c.reindex_file("nope.txt").await.unwrap_err();

        assert!(matches!(err, IndexError::Io { .. }));
        assert_eq!(provider(&c).total_calls(), 0);
    }

    #[tokio::test]
    async fn test_forget_file_removes_records_and_fingerprint() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let c = coordinator(dir.path()).await;
        c.reindex_file("a.rs").await.unwrap();

        let removed = c.forget_file("a.rs").await.unwrap();

        assert_eq!(removed, 2);
        assert!(c.store().records_for("a.rs").is_empty());
        assert!(c.hasher().stored("a.rs").await.is_none());
    }
}
