//! Configuration for building a [`VectorDatabase`](crate::VectorDatabase).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Configuration for an engine that lives only for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InMemoryConfig {
    /// Name of the data container collection ensured at startup.
    pub data_container_name: String,
}

/// Configuration for an engine persisted under a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistentConfig {
    /// Name of the data container collection ensured at startup.
    pub data_container_name: String,
    /// Path to the persistent database file.
    pub path: PathBuf,
}

/// Engine configuration, tagged by `kind` when serialized.
///
/// ```json
/// { "kind": "persistent", "data_container_name": "notes", "path": "./data/db.json" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DbConfig {
    /// In-memory engine.
    InMemory(InMemoryConfig),
    /// Persistent engine.
    Persistent(PersistentConfig),
}

impl DbConfig {
    /// Create a new builder for constructing a [`DbConfig`].
    pub fn builder() -> DbConfigBuilder {
        DbConfigBuilder::default()
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] for malformed JSON and
    /// [`DbError::Config`] if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Name of the data container collection.
    pub fn data_container_name(&self) -> &str {
        match self {
            Self::InMemory(c) => &c.data_container_name,
            Self::Persistent(c) => &c.data_container_name,
        }
    }

    /// Snapshot path for persistent configurations.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::InMemory(_) => None,
            Self::Persistent(c) => Some(&c.path),
        }
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if:
    /// - `data_container_name` is empty or blank
    /// - a persistent `path` is empty
    pub fn validate(&self) -> Result<()> {
        if self.data_container_name().trim().is_empty() {
            return Err(DbError::Config("data_container_name must not be empty".to_string()));
        }
        if self.path().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(DbError::Config("path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`DbConfig`].
///
/// Produces [`DbConfig::Persistent`] when a path is set and
/// [`DbConfig::InMemory`] otherwise.
#[derive(Debug, Clone, Default)]
pub struct DbConfigBuilder {
    data_container_name: Option<String>,
    path: Option<PathBuf>,
}

impl DbConfigBuilder {
    /// Set the data container collection name.
    pub fn data_container_name(mut self, name: impl Into<String>) -> Self {
        self.data_container_name = Some(name.into());
        self
    }

    /// Persist the engine at the given path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build the [`DbConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the container name is missing or the
    /// result fails [`DbConfig::validate`].
    pub fn build(self) -> Result<DbConfig> {
        let data_container_name = self
            .data_container_name
            .ok_or_else(|| DbError::Config("data_container_name is required".to_string()))?;
        let config = match self.path {
            Some(path) => DbConfig::Persistent(PersistentConfig { data_container_name, path }),
            None => DbConfig::InMemory(InMemoryConfig { data_container_name }),
        };
        config.validate()?;
        Ok(config)
    }
}
