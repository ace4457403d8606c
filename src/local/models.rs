//! Data models for the local index.

use serde::{Deserialize, Serialize};

// ============================================================================
// Record Models
// ============================================================================

/// Default vector dimension for embeddings (text-embedding-3-small).
pub const DEFAULT_VECTOR_DIM: i32 = 1536;

/// Metadata stored alongside every vector.
///
/// `path` is the join key: every record produced from a file shares it, and
/// invalidation deletes by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// File path relative to the repository root.
    pub path: String,
    /// Raw (redacted) chunk or file content.
    pub text: String,
    /// Provider-written description of `text`.
    pub explanation: String,
}

/// A record to insert into the vector store.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A record as persisted, with its store-assigned id.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub metadata: RecordMetadata,
}

/// A hit from vector similarity search.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub metadata: RecordMetadata,
    /// L2 distance (lower = more similar)
    pub distance: f32,
}

impl ScoredRecord {
    /// Convert distance to similarity score (0-1, higher = more similar).
    pub fn score(&self) -> f32 {
        1.0 / (1.0 + self.distance)
    }
}

// ============================================================================
// Search Models
// ============================================================================

/// Search result shown to users and handed to the completion prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub score: f32,
    pub path: String,
    pub text: String,
    pub explanation: String,
}

impl From<ScoredRecord> for SearchResult {
    fn from(hit: ScoredRecord) -> Self {
        Self {
            score: hit.score(),
            path: hit.metadata.path,
            text: hit.metadata.text,
            explanation: hit.metadata.explanation,
        }
    }
}
