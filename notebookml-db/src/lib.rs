//! Provenance-aware storage and similarity search over a vector engine.
//!
//! This crate provides:
//! - Typed provenance metadata ([`DataMeta`], [`EntityMeta`], [`SourceMeta`])
//! - A lossless codec between nested metadata and flat engine attributes
//! - Content-addressed identifiers that deduplicate identical entries
//! - [`VectorDatabase`], a facade enforcing collection preconditions
//! - [`InMemoryEngine`], a reference engine with optional snapshot persistence

pub mod codec;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod identity;
pub mod inmemory;
pub mod meta;

pub use codec::{
    FlatMetadata, FlatRecord, META_DELIMITER, MetadataValue, flatten, reconstruct, unflatten,
};
pub use config::{DbConfig, DbConfigBuilder, InMemoryConfig, PersistentConfig};
pub use database::VectorDatabase;
pub use engine::{Collection, QueryResult, VectorEngine};
pub use error::{DbError, Result};
pub use identity::meta_identifier;
pub use inmemory::InMemoryEngine;
pub use meta::{
    Data, DataKind, DataMeta, EntityKind, EntityMeta, MICROSECOND_RANGE_SECS, MetaData,
    NULL_ENTITY, SourceKind, SourceMeta, Timestamp,
};
