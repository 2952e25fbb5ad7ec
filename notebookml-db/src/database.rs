//! Store facade over a [`VectorEngine`].
//!
//! [`VectorDatabase`] checks collection existence, flattens metadata, derives
//! content-addressed identifiers and reconstructs typed [`Data`] from query
//! results. Ranking and truncation stay with the engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use notebookml_db::{DbConfig, VectorDatabase};
//!
//! let config = DbConfig::builder().data_container_name("notes").build()?;
//! let db = VectorDatabase::from_config(config).await?;
//!
//! db.add("notes", &items).await?;
//! let hits = db.search("notes", "hello", 5).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::codec::{flatten, reconstruct};
use crate::config::DbConfig;
use crate::engine::{Collection, QueryResult, VectorEngine};
use crate::error::{DbError, Result};
use crate::identity::meta_identifier;
use crate::inmemory::InMemoryEngine;
use crate::meta::{Data, DataMeta};

/// Metadata-aware access layer over a vector engine.
///
/// Holds no state besides the engine handle and its configuration. Every
/// operation reaches the engine and may suspend.
pub struct VectorDatabase {
    engine: Arc<dyn VectorEngine>,
    config: DbConfig,
}

impl VectorDatabase {
    /// Build the engine selected by `config` and ensure its data container
    /// collection exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an invalid configuration, or the
    /// engine's error if it cannot be opened or bootstrapped.
    pub async fn from_config(config: DbConfig) -> Result<Self> {
        config.validate()?;
        let engine: Arc<dyn VectorEngine> = match &config {
            DbConfig::InMemory(_) => Arc::new(InMemoryEngine::new()),
            DbConfig::Persistent(persistent) => {
                Arc::new(InMemoryEngine::open(&persistent.path).await?)
            }
        };
        Self::with_engine(engine, config).await
    }

    /// Wrap an existing engine and ensure the data container collection exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an invalid configuration, or the
    /// engine's error if the container cannot be created.
    pub async fn with_engine(engine: Arc<dyn VectorEngine>, config: DbConfig) -> Result<Self> {
        config.validate()?;
        let container = config.data_container_name();
        engine.get_or_create_collection(container).await.map_err(|e| {
            error!(collection = container, error = %e, "failed to ensure data container");
            e
        })?;
        info!(collection = container, "vector database ready");
        Ok(Self { engine, config })
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Name of the data container collection.
    pub fn data_container_name(&self) -> &str {
        self.config.data_container_name()
    }

    /// Return a reference to the engine.
    pub fn engine(&self) -> &Arc<dyn VectorEngine> {
        &self.engine
    }

    /// Create a named collection.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged if it rejects the name, for
    /// example because the collection already exists.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.engine.create_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            e
        })?;
        info!(collection = name, "created collection");
        Ok(())
    }

    /// Whether a collection exists. Asks the engine on every call.
    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        let names = self.engine.list_collections().await?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn require_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        if !self.has_collection(name).await? {
            return Err(DbError::CollectionNotFound(name.to_string()));
        }
        self.engine.get_collection(name).await
    }

    /// Store items in a collection as one engine batch.
    ///
    /// Each item's identifier is derived from its metadata, so an item whose
    /// metadata matches a stored entry replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CollectionNotFound`] before touching the engine if
    /// the collection does not exist, and the engine's error if the batch is
    /// rejected.
    pub async fn add(&self, collection: &str, items: &[Data]) -> Result<()> {
        let handle = self.require_collection(collection).await?;
        if items.is_empty() {
            debug!(collection, "nothing to add");
            return Ok(());
        }

        let mut documents = Vec::with_capacity(items.len());
        let mut metadatas = Vec::with_capacity(items.len());
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            documents.push(item.content.clone());
            metadatas.push(flatten(&item.meta));
            ids.push(meta_identifier(&item.meta)?);
        }

        handle.add(documents, metadatas, ids).await.map_err(|e| {
            error!(collection, count = items.len(), error = %e, "add failed");
            e
        })?;
        debug!(collection, count = items.len(), "added items");
        Ok(())
    }

    /// Search a collection for the `limit` entries most similar to `query`.
    ///
    /// Results keep the engine's ranking order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CollectionNotFound`] if the collection does not
    /// exist, the engine's error if the query fails, and
    /// [`DbError::Validation`] if stored metadata cannot be reconstructed.
    pub async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<Data>> {
        let handle = self.require_collection(collection).await?;
        let QueryResult { documents, metadatas, .. } =
            handle.query(&[query], limit).await.map_err(|e| {
                error!(collection, limit, error = %e, "query failed");
                e
            })?;

        let (documents, metadatas) =
            match (documents.into_iter().next(), metadatas.into_iter().next()) {
                (Some(documents), Some(metadatas)) => (documents, metadatas),
                (None, None) => return Ok(Vec::new()),
                (documents, _) => {
                    let present = if documents.is_some() { "documents" } else { "metadatas" };
                    return Err(DbError::backend(
                        "engine",
                        format!("query returned {present} without a matching group"),
                    ));
                }
            };
        if documents.len() != metadatas.len() {
            return Err(DbError::backend(
                "engine",
                format!(
                    "query returned {} documents but {} metadatas",
                    documents.len(),
                    metadatas.len()
                ),
            ));
        }

        let results = metadatas
            .iter()
            .zip(documents)
            .map(|(flat, content)| {
                reconstruct::<DataMeta>(flat).map(|meta| Data::new(meta, content))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(collection, limit, result_count = results.len(), "search completed");
        Ok(results)
    }
}
