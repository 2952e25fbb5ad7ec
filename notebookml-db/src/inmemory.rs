//! In-memory vector engine with lexical similarity.
//!
//! This module provides [`InMemoryEngine`], a reference [`VectorEngine`]
//! backed by a `BTreeMap` protected by a `tokio::sync::RwLock`. It ranks
//! records by word-token overlap (Jaccard) instead of embeddings, which is
//! enough for development, tests and demos. An engine opened with
//! [`InMemoryEngine::open`] mirrors its state to a JSON snapshot file after
//! every mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::codec::FlatMetadata;
use crate::engine::{Collection, QueryResult, VectorEngine};
use crate::error::{DbError, Result};

const BACKEND: &str = "InMemory";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct StoredRecord {
    id: String,
    document: String,
    metadata: FlatMetadata,
}

/// Records of one collection in insertion order, indexed by id.
///
/// Snapshots store only the record list; the index is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<StoredRecord>", into = "Vec<StoredRecord>")]
struct CollectionState {
    records: Vec<StoredRecord>,
    positions: HashMap<String, usize>,
}

impl CollectionState {
    /// Insert a record, or replace the one with the same id in place.
    fn upsert(&mut self, record: StoredRecord) {
        match self.positions.get(&record.id) {
            Some(&position) => self.records[position] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }
}

impl From<Vec<StoredRecord>> for CollectionState {
    fn from(records: Vec<StoredRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.upsert(record);
        }
        state
    }
}

impl From<CollectionState> for Vec<StoredRecord> {
    fn from(state: CollectionState) -> Self {
        state.records
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EngineState {
    collections: BTreeMap<String, CollectionState>,
}

impl EngineState {
    fn collection_mut(&mut self, name: &str) -> Result<&mut CollectionState> {
        self.collections.get_mut(name).ok_or_else(|| missing(name))
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<EngineState>,
    snapshot: Option<PathBuf>,
}

impl Shared {
    /// Apply `mutate` to `state`, which the caller holds under the write lock.
    ///
    /// With a snapshot, the mutation runs on a copy that replaces `state`
    /// only once the snapshot write has succeeded, so a failed write leaves
    /// memory and disk unchanged.
    async fn commit<T>(
        &self,
        state: &mut EngineState,
        mutate: impl FnOnce(&mut EngineState) -> Result<T>,
    ) -> Result<T> {
        let Some(path) = &self.snapshot else {
            return mutate(state);
        };
        let mut next = state.clone();
        let output = mutate(&mut next)?;
        write_snapshot(path, &next).await?;
        *state = next;
        Ok(output)
    }
}

/// Write the snapshot to a sibling temporary file and rename it over `path`,
/// so readers never observe a partially written snapshot.
async fn write_snapshot(path: &Path, state: &EngineState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, serde_json::to_vec(state)?).await?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        warn!(path = %path.display(), error = %e, "snapshot rename failed");
        if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
            debug!(path = %staging.display(), error = %cleanup, "staging file not removed");
        }
        return Err(e.into());
    }
    Ok(())
}

fn missing(name: &str) -> DbError {
    DbError::backend(BACKEND, format!("collection '{name}' does not exist"))
}

/// An in-memory [`VectorEngine`] with optional JSON snapshot persistence.
///
/// # Example
///
/// ```rust,ignore
/// use notebookml_db::{InMemoryEngine, VectorEngine};
///
/// let engine = InMemoryEngine::new();
/// engine.create_collection("notes").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    shared: Arc<Shared>,
}

impl InMemoryEngine {
    /// Create a new empty engine that keeps everything in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an engine mirrored to the snapshot file at `path`, loading it if
    /// it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] or [`DbError::Serialization`] if an existing
    /// snapshot cannot be read.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EngineState::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), collections = state.collections.len(), "opened snapshot");
        Ok(Self { shared: Arc::new(Shared { state: RwLock::new(state), snapshot: Some(path) }) })
    }

    /// Snapshot file backing this engine, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.shared.snapshot.as_deref()
    }

    fn handle(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(InMemoryCollection { name: name.to_string(), shared: Arc::clone(&self.shared) })
    }
}

#[async_trait]
impl VectorEngine for InMemoryEngine {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut state = self.shared.state.write().await;
        if state.collections.contains_key(name) {
            return Err(DbError::backend(BACKEND, format!("collection '{name}' already exists")));
        }
        self.shared
            .commit(&mut state, |next| {
                next.collections.insert(name.to_string(), CollectionState::default());
                Ok(())
            })
            .await
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        let mut state = self.shared.state.write().await;
        if !state.collections.contains_key(name) {
            self.shared
                .commit(&mut state, |next| {
                    next.collections.insert(name.to_string(), CollectionState::default());
                    Ok(())
                })
                .await?;
        }
        Ok(self.handle(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let state = self.shared.state.read().await;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        let state = self.shared.state.read().await;
        if !state.collections.contains_key(name) {
            return Err(missing(name));
        }
        Ok(self.handle(name))
    }
}

/// Handle to one collection of an [`InMemoryEngine`].
#[derive(Debug)]
struct InMemoryCollection {
    name: String,
    shared: Arc<Shared>,
}

/// Lowercased alphanumeric word tokens.
fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two token sets. Returns 0.0 if both are empty.
fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self) -> Result<usize> {
        let state = self.shared.state.read().await;
        state
            .collections
            .get(&self.name)
            .map(|c| c.records.len())
            .ok_or_else(|| missing(&self.name))
    }

    async fn add(
        &self,
        documents: Vec<String>,
        metadatas: Vec<FlatMetadata>,
        ids: Vec<String>,
    ) -> Result<()> {
        if documents.len() != ids.len() || metadatas.len() != ids.len() {
            return Err(DbError::backend(
                BACKEND,
                format!(
                    "mismatched batch: {} documents, {} metadatas, {} ids",
                    documents.len(),
                    metadatas.len(),
                    ids.len()
                ),
            ));
        }

        let mut state = self.shared.state.write().await;
        let count = ids.len();
        self.shared
            .commit(&mut state, |next| {
                let collection = next.collection_mut(&self.name)?;
                for ((id, document), metadata) in ids.into_iter().zip(documents).zip(metadatas) {
                    collection.upsert(StoredRecord { id, document, metadata });
                }
                Ok(())
            })
            .await?;
        debug!(collection = %self.name, count, "stored records");
        Ok(())
    }

    async fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult> {
        if n_results == 0 {
            return Err(DbError::backend(BACKEND, "n_results must be greater than zero"));
        }

        let state = self.shared.state.read().await;
        let records =
            &state.collections.get(&self.name).ok_or_else(|| missing(&self.name))?.records;
        let record_tokens: Vec<HashSet<String>> =
            records.iter().map(|r| tokens(&r.document)).collect();

        let mut result = QueryResult::default();
        for query in query_texts {
            let query_tokens = tokens(query);
            let mut scored: Vec<(f32, &StoredRecord)> = records
                .iter()
                .zip(&record_tokens)
                .map(|(record, toks)| (similarity(&query_tokens, toks), record))
                .collect();

            // Stable sort: ties keep insertion order.
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.truncate(n_results);

            result.ids.push(scored.iter().map(|(_, r)| r.id.clone()).collect());
            result.documents.push(scored.iter().map(|(_, r)| r.document.clone()).collect());
            result.metadatas.push(scored.iter().map(|(_, r)| r.metadata.clone()).collect());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MetadataValue;

    fn meta(tag: &str) -> FlatMetadata {
        FlatMetadata::from([("tag".to_string(), MetadataValue::from(tag))])
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let engine = InMemoryEngine::new();
        engine.create_collection("notes").await.unwrap();
        let err = engine.create_collection("notes").await.unwrap_err();
        assert!(matches!(err, DbError::Backend { .. }));
        assert_eq!(engine.list_collections().await.unwrap(), vec!["notes".to_string()]);
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let engine = InMemoryEngine::new();
        engine.get_or_create_collection("notes").await.unwrap();
        let handle = engine.get_or_create_collection("notes").await.unwrap();
        assert_eq!(handle.name(), "notes");
        assert_eq!(engine.list_collections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_missing_collection_fails() {
        let engine = InMemoryEngine::new();
        assert!(engine.get_collection("nope").await.is_err());
    }

    #[tokio::test]
    async fn add_upserts_by_id() {
        let engine = InMemoryEngine::new();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        notes
            .add(
                vec!["first".into(), "second".into()],
                vec![meta("a"), meta("b")],
                vec!["1".into(), "2".into()],
            )
            .await
            .unwrap();
        notes.add(vec!["first again".into()], vec![meta("c")], vec!["1".into()]).await.unwrap();

        assert_eq!(notes.count().await.unwrap(), 2);
        let result = notes.query(&["first again"], 1).await.unwrap();
        assert_eq!(result.ids, vec![vec!["1".to_string()]]);
        assert_eq!(result.metadatas[0][0], meta("c"));
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_batch_keep_first_position_and_last_value() {
        let engine = InMemoryEngine::new();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        notes
            .add(
                vec!["alpha".into(), "beta".into(), "alpha revised".into()],
                vec![meta("a"), meta("b"), meta("c")],
                vec!["1".into(), "2".into(), "1".into()],
            )
            .await
            .unwrap();

        assert_eq!(notes.count().await.unwrap(), 2);
        let result = notes.query(&["unrelated"], 10).await.unwrap();
        assert_eq!(result.ids[0], vec!["1".to_string(), "2".to_string()]);
        assert_eq!(result.documents[0][0], "alpha revised");
    }

    #[tokio::test]
    async fn add_rejects_mismatched_batch() {
        let engine = InMemoryEngine::new();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        let err = notes.add(vec!["a".into()], vec![], vec!["1".into()]).await.unwrap_err();
        assert!(matches!(err, DbError::Backend { .. }));
        assert_eq!(notes.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_ranks_by_token_overlap_and_truncates() {
        let engine = InMemoryEngine::new();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        notes
            .add(
                vec![
                    "rust ownership rules".into(),
                    "hello world".into(),
                    "Hello there, world!".into(),
                ],
                vec![meta("a"), meta("b"), meta("c")],
                vec!["a".into(), "b".into(), "c".into()],
            )
            .await
            .unwrap();

        let result = notes.query(&["hello world", "rust"], 2).await.unwrap();
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.ids[0], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(result.ids[1][0], "a");
        assert_eq!(result.ids[1].len(), 2);
    }

    #[tokio::test]
    async fn query_rejects_zero_results() {
        let engine = InMemoryEngine::new();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        assert!(notes.query(&["x"], 0).await.is_err());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("snapshot.json");

        let engine = InMemoryEngine::open(&path).await.unwrap();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        notes.add(vec!["kept".into()], vec![meta("k")], vec!["k".into()]).await.unwrap();

        let reopened = InMemoryEngine::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot_path(), Some(path.as_path()));
        let notes = reopened.get_collection("notes").await.unwrap();
        let result = notes.query(&["kept"], 5).await.unwrap();
        assert_eq!(result.documents, vec![vec!["kept".to_string()]]);
        assert_eq!(result.metadatas[0][0], meta("k"));
    }

    #[tokio::test]
    async fn snapshot_write_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let engine = InMemoryEngine::open(&path).await.unwrap();
        engine.create_collection("notes").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("snapshot.json")]);
    }

    #[tokio::test]
    async fn failed_snapshot_write_discards_the_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let engine = InMemoryEngine::open(&path).await.unwrap();
        let notes = engine.get_or_create_collection("notes").await.unwrap();
        notes.add(vec!["kept".into()], vec![meta("k")], vec!["k".into()]).await.unwrap();

        // A directory in place of the snapshot makes every later write fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(notes.add(vec!["lost".into()], vec![meta("l")], vec!["l".into()]).await.is_err());
        assert_eq!(notes.count().await.unwrap(), 1);
        let result = notes.query(&["kept"], 5).await.unwrap();
        assert_eq!(result.documents, vec![vec!["kept".to_string()]]);

        assert!(engine.create_collection("drafts").await.is_err());
        assert!(engine.get_or_create_collection("archive").await.is_err());
        assert_eq!(engine.list_collections().await.unwrap(), vec!["notes".to_string()]);
        assert!(!dir.path().join("snapshot.json.tmp").exists());
    }
}
