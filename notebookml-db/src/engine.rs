//! Contract of the vector-search engine the store delegates to.
//!
//! The engine owns similarity ranking, embeddings and persistence. The store
//! only needs collection management plus batched `add` and `query` on a
//! collection handle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::FlatMetadata;
use crate::error::Result;

/// Ranked results of a [`Collection::query`], one group per query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Record identifiers per group.
    pub ids: Vec<Vec<String>>,
    /// Document texts per group.
    pub documents: Vec<Vec<String>>,
    /// Flat metadata per group.
    pub metadatas: Vec<Vec<FlatMetadata>>,
}

/// A vector-search engine managing named collections.
///
/// # Example
///
/// ```rust,ignore
/// use notebookml_db::{InMemoryEngine, VectorEngine};
///
/// let engine = InMemoryEngine::new();
/// engine.create_collection("notes").await?;
/// let notes = engine.get_collection("notes").await?;
/// notes.add(documents, metadatas, ids).await?;
/// ```
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// Create a named collection. Fails if the name is already taken.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Return the named collection, creating it first if needed.
    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Return a handle to an existing collection. Fails if it is absent.
    async fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>>;
}

/// Handle to a single collection of documents, metadata and identifiers.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Store records. The three vectors are parallel; a record whose id is
    /// already present replaces the stored one.
    async fn add(
        &self,
        documents: Vec<String>,
        metadatas: Vec<FlatMetadata>,
        ids: Vec<String>,
    ) -> Result<()>;

    /// Return up to `n_results` records per query text, most similar first.
    async fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult>;
}
