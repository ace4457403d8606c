//! In-memory provider and store used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use super::models::{IndexRecord, ScoredRecord, StoredRecord};
use super::provider::{Provider, ProviderError};
use super::store::{IndexStore, StoreError};

/// Provider that replays scripted responses, then falls back to
/// deterministic defaults.
pub struct FakeProvider {
    dim: usize,
    embed_script: Mutex<VecDeque<Result<Vec<f32>, ProviderError>>>,
    complete_script: Mutex<VecDeque<Result<String, ProviderError>>>,
    embed_inputs: Mutex<Vec<String>>,
    complete_prompts: Mutex<Vec<String>>,
    embed_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            embed_script: Mutex::new(VecDeque::new()),
            complete_script: Mutex::new(VecDeque::new()),
            embed_inputs: Mutex::new(Vec::new()),
            complete_prompts: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_embed(&self, response: Result<Vec<f32>, ProviderError>) {
        self.embed_script.lock().unwrap().push_back(response);
    }

    pub fn script_complete(&self, response: Result<String, ProviderError>) {
        self.complete_script.lock().unwrap().push_back(response);
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.embed_calls() + self.complete_calls()
    }

    pub fn embed_inputs(&self) -> Vec<String> {
        self.embed_inputs.lock().unwrap().clone()
    }

    pub fn complete_prompts(&self) -> Vec<String> {
        self.complete_prompts.lock().unwrap().clone()
    }

    /// Deterministic vector derived from the text length.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dim];
        vector[0] = text.len() as f32;
        vector
    }
}

impl Provider for FakeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embed_inputs.lock().unwrap().push(text.to_string());

        let scripted = self.embed_script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(self.vector_for(text)),
        }
    }

    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.complete_prompts.lock().unwrap().push(user.to_string());

        let scripted = self.complete_script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(format!("explains {} chars", user.len())),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    created: bool,
    records: Vec<(String, IndexRecord)>,
    pending: Option<(Vec<String>, Vec<(String, IndexRecord)>)>,
    mutations: usize,
    inserted_paths: Vec<String>,
    inserts_before_failure: Option<usize>,
}

/// Vector store kept in a `Vec`, with the same batching semantics as the
/// LanceDB store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert after the next `n` fail.
    pub fn fail_inserts_after(&self, n: usize) {
        self.state.lock().unwrap().inserts_before_failure = Some(n);
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().inserts_before_failure = None;
    }

    /// Number of applied mutations (each insert and delete counts once).
    pub fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    /// Paths of inserted records, in insertion order.
    pub fn inserted_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().inserted_paths.clone()
    }

    pub fn records_for(&self, path: &str) -> Vec<IndexRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(_, r)| r.metadata.path == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

impl IndexStore for MemoryStore {
    async fn ensure_created(&self) -> Result<(), StoreError> {
        self.state.lock().unwrap().created = true;
        Ok(())
    }

    async fn insert(&self, record: IndexRecord) -> Result<String, StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if !state.created {
            return Err(StoreError::NotCreated);
        }
        if let Some(remaining) = state.inserts_before_failure {
            if remaining == 0 {
                return Err(StoreError::Invalid("simulated insert failure".to_string()));
            }
            state.inserts_before_failure = Some(remaining - 1);
        }

        let id = Uuid::new_v4().to_string();
        state.inserted_paths.push(record.metadata.path.clone());
        match state.pending.as_mut() {
            Some((_, inserts)) => inserts.push((id.clone(), record)),
            None => {
                state.records.push((id.clone(), record));
                state.mutations += 1;
            }
        }
        Ok(id)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.pending.as_mut() {
            Some((deletes, _)) => deletes.push(id.to_string()),
            None => {
                state.records.retain(|(rid, _)| rid != id);
                state.mutations += 1;
            }
        }
        Ok(())
    }

    async fn query_by_path(&self, path: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|(_, r)| r.metadata.path == path)
            .map(|(id, r)| StoredRecord {
                id: id.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn query_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut hits: Vec<ScoredRecord> = state
            .records
            .iter()
            .map(|(id, r)| ScoredRecord {
                id: id.clone(),
                metadata: r.metadata.clone(),
                distance: r
                    .vector
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }

    async fn begin_update(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.pending.is_some() {
            return Err(StoreError::Boundary("update already in progress".to_string()));
        }
        state.pending = Some((Vec::new(), Vec::new()));
        Ok(())
    }

    async fn end_update(&self) -> Result<(), StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let (deletes, inserts) = state
            .pending
            .take()
            .ok_or_else(|| StoreError::Boundary("no update in progress".to_string()))?;

        state.mutations += deletes.len() + inserts.len();
        state.records.retain(|(id, _)| !deletes.contains(id));
        state.records.extend(inserts);
        Ok(())
    }
}
