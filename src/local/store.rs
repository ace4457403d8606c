//! Vector store seam.
//!
//! The coordinator only talks to the store through [`IndexStore`], so the
//! LanceDB implementation and the in-memory test store are interchangeable.

use std::future::Future;

use thiserror::Error;

use super::models::{IndexRecord, ScoredRecord, StoredRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("LanceDB error: {0}")]
    Lance(#[from] lancedb::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("vector has {actual} dimensions, store expects {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("store not created; call ensure_created first")]
    NotCreated,

    #[error("update boundary misuse: {0}")]
    Boundary(String),

    #[error("invalid store data: {0}")]
    Invalid(String),
}

/// Persistent vector index keyed by record id, filterable by `path`.
///
/// Mutations issued between [`begin_update`](IndexStore::begin_update) and
/// [`end_update`](IndexStore::end_update) are applied as one batch when the
/// update ends. Outside an update they apply immediately.
pub trait IndexStore: Send + Sync {
    /// Create the backing table if it does not exist yet.
    fn ensure_created(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a record, returning its generated id.
    fn insert(
        &self,
        record: IndexRecord,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Delete a record by id.
    fn delete_by_id(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All records whose metadata `path` equals `path`.
    fn query_by_path(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<StoredRecord>, StoreError>> + Send;

    /// The `top_k` nearest records to `vector`, closest first.
    fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<ScoredRecord>, StoreError>> + Send;

    /// Total number of records.
    fn count(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Open a batched update.
    fn begin_update(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply every mutation issued since `begin_update`.
    fn end_update(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
