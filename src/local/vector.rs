//! LanceDB vector storage for similarity search.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use tracing::debug;
use uuid::Uuid;

use super::models::{IndexRecord, RecordMetadata, ScoredRecord, StoredRecord};
use super::store::{IndexStore, StoreError};

/// Name of the single table holding every record.
const TABLE_NAME: &str = "files";

/// Mutations buffered between `begin_update` and `end_update`.
#[derive(Debug, Default)]
struct PendingUpdate {
    deletes: Vec<String>,
    inserts: Vec<(String, IndexRecord)>,
}

/// LanceDB-based vector store.
pub struct VectorStore {
    db: Connection,
    dim: i32,
    pending: Mutex<Option<PendingUpdate>>,
}

impl VectorStore {
    /// Open or create a vector store at the given path.
    pub async fn open(path: &Path, dim: i32) -> Result<Self, StoreError> {
        let db = lancedb::connect(&path.to_string_lossy()).execute().await?;

        Ok(Self {
            db,
            dim,
            pending: Mutex::new(None),
        })
    }

    async fn table(&self) -> Result<Option<Table>, StoreError> {
        let names = self.db.table_names().execute().await?;
        if !names.iter().any(|n| n == TABLE_NAME) {
            return Ok(None);
        }
        Ok(Some(self.db.open_table(TABLE_NAME).execute().await?))
    }

    async fn require_table(&self) -> Result<Table, StoreError> {
        self.table().await?.ok_or(StoreError::NotCreated)
    }

    fn pending(&self) -> MutexGuard<'_, Option<PendingUpdate>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue an insert if an update is open. Returns the record back otherwise.
    fn buffer_insert(&self, id: &str, record: IndexRecord) -> Option<IndexRecord> {
        match self.pending().as_mut() {
            Some(update) => {
                update.inserts.push((id.to_string(), record));
                None
            }
            None => Some(record),
        }
    }

    /// Queue a delete if an update is open.
    fn buffer_delete(&self, id: &str) -> bool {
        match self.pending().as_mut() {
            Some(update) => {
                update.deletes.push(id.to_string());
                true
            }
            None => false,
        }
    }

    async fn apply_inserts(&self, records: &[(String, IndexRecord)]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let table = self.require_table().await?;
        let batch = self.records_to_batch(records)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], self.schema());

        table.add(Box::new(batches)).execute().await?;
        Ok(())
    }

    async fn apply_deletes(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let table = self.require_table().await?;
        let list = ids
            .iter()
            .map(|id| quote(id))
            .collect::<Vec<_>>()
            .join(", ");

        table.delete(&format!("id IN ({})", list)).await?;
        Ok(())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dim as usize {
            return Err(StoreError::Dimension {
                expected: self.dim as usize,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("explanation", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dim,
                ),
                false,
            ),
        ]))
    }

    fn records_to_batch(&self, records: &[(String, IndexRecord)]) -> Result<RecordBatch, StoreError> {
        let ids: Vec<&str> = records.iter().map(|(id, _)| id.as_str()).collect();
        let paths: Vec<&str> = records
            .iter()
            .map(|(_, r)| r.metadata.path.as_str())
            .collect();
        let texts: Vec<&str> = records
            .iter()
            .map(|(_, r)| r.metadata.text.as_str())
            .collect();
        let explanations: Vec<&str> = records
            .iter()
            .map(|(_, r)| r.metadata.explanation.as_str())
            .collect();
        let flat_vectors: Vec<f32> = records
            .iter()
            .flat_map(|(_, r)| r.vector.iter().copied())
            .collect();

        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dim,
            Arc::new(Float32Array::from(flat_vectors)),
            None,
        )?;

        let batch = RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(paths)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(explanations)),
                Arc::new(vectors),
            ],
        )?;

        Ok(batch)
    }

    fn batch_to_records(batch: &RecordBatch) -> Result<Vec<StoredRecord>, StoreError> {
        let ids = string_column(batch, "id")?;
        let paths = string_column(batch, "path")?;
        let texts = string_column(batch, "text")?;
        let explanations = string_column(batch, "explanation")?;

        let mut records = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            records.push(StoredRecord {
                id: ids.value(i).to_string(),
                metadata: RecordMetadata {
                    path: paths.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    explanation: explanations.value(i).to_string(),
                },
            });
        }

        Ok(records)
    }

    fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<ScoredRecord>, StoreError> {
        let records = Self::batch_to_records(batch)?;
        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| StoreError::Invalid("missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StoreError::Invalid("invalid _distance type".to_string()))?;

        Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, record)| ScoredRecord {
                id: record.id,
                metadata: record.metadata,
                distance: distances.value(i),
            })
            .collect())
    }
}

impl IndexStore for VectorStore {
    async fn ensure_created(&self) -> Result<(), StoreError> {
        if self.table().await?.is_some() {
            return Ok(());
        }

        let schema = self.schema();
        let empty = self.records_to_batch(&[])?;
        let batches = RecordBatchIterator::new(vec![Ok(empty)], schema);

        self.db
            .create_table(TABLE_NAME, Box::new(batches))
            .execute()
            .await?;

        debug!(table = TABLE_NAME, "created vector table");
        Ok(())
    }

    async fn insert(&self, record: IndexRecord) -> Result<String, StoreError> {
        self.check_dim(&record.vector)?;

        let id = Uuid::new_v4().to_string();
        if let Some(record) = self.buffer_insert(&id, record) {
            self.apply_inserts(&[(id.clone(), record)]).await?;
        }

        Ok(id)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        if !self.buffer_delete(id) {
            self.apply_deletes(&[id.to_string()]).await?;
        }
        Ok(())
    }

    async fn query_by_path(&self, path: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let Some(table) = self.table().await? else {
            return Ok(vec![]);
        };

        let filter = format!("path = {}", quote(path));
        // Plain queries carry a default row limit, so size it to the match count.
        let matches = table.count_rows(Some(filter.clone())).await?;
        if matches == 0 {
            return Ok(vec![]);
        }

        let batches = table
            .query()
            .only_if(filter)
            .limit(matches)
            .execute()
            .await?
            .try_collect::<Vec<_>>()
            .await?;

        let mut records = Vec::new();
        for batch in &batches {
            records.extend(Self::batch_to_records(batch)?);
        }

        Ok(records)
    }

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        self.check_dim(vector)?;

        let Some(table) = self.table().await? else {
            return Ok(vec![]);
        };

        let batches = table
            .query()
            .nearest_to(vector)?
            .limit(top_k)
            .execute()
            .await?
            .try_collect::<Vec<_>>()
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::batch_to_hits(batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        match self.table().await? {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    async fn begin_update(&self) -> Result<(), StoreError> {
        let mut pending = self.pending();
        if pending.is_some() {
            return Err(StoreError::Boundary("update already in progress".to_string()));
        }
        *pending = Some(PendingUpdate::default());
        Ok(())
    }

    async fn end_update(&self) -> Result<(), StoreError> {
        let update = self
            .pending()
            .take()
            .ok_or_else(|| StoreError::Boundary("no update in progress".to_string()))?;

        debug!(
            deletes = update.deletes.len(),
            inserts = update.inserts.len(),
            "applying batched update"
        );

        self.apply_deletes(&update.deletes).await?;
        self.apply_inserts(&update.inserts).await?;
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Invalid(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::Invalid(format!("invalid {} type", name)))
}

/// Quote a value as an SQL string literal for LanceDB filters.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
