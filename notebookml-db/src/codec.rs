//! Flatten/reconstruct codec between nested metadata and flat attributes.
//!
//! Vector engines store per-record attributes as a flat map of string keys
//! to scalars. [`flatten`] writes every leaf of a metadata tree under a
//! dotted key path (`owner.id`, `source.url`, ...), empty strings included,
//! and [`reconstruct`] reads the same paths back into the typed record.
//!
//! Each record type implements [`FlatRecord`] by hand. Field names never
//! contain [`META_DELIMITER`]; it is not escaped.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::meta::{
    DataKind, DataMeta, EntityKind, EntityMeta, SourceKind, SourceMeta, Timestamp,
};

/// Separator between path segments in flattened keys.
pub const META_DELIMITER: &str = ".";

/// A scalar attribute value accepted by vector engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Int(i64),
    /// Floating point attribute.
    Float(f64),
    /// String attribute.
    Str(String),
}

impl MetadataValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Flat attribute map as stored by the engine.
pub type FlatMetadata = BTreeMap<String, MetadataValue>;

/// A record with an explicit mapping to and from flat attributes.
pub trait FlatRecord: Sized {
    /// Write every leaf field under `prefix` into `out`.
    fn write_flat(&self, prefix: &str, out: &mut FlatMetadata);

    /// Read the record stored under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] naming the full key path when a
    /// required field is missing or holds the wrong kind of value.
    fn read_flat(flat: &FlatMetadata, prefix: &str) -> Result<Self>;
}

/// Flatten a record into engine attributes.
pub fn flatten<R: FlatRecord>(record: &R) -> FlatMetadata {
    let mut out = FlatMetadata::new();
    record.write_flat("", &mut out);
    out
}

/// Rebuild a record from engine attributes.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if a required path is missing or invalid.
pub fn reconstruct<R: FlatRecord>(flat: &FlatMetadata) -> Result<R> {
    R::read_flat(flat, "")
}

/// Expand flat attributes into a nested JSON object by splitting keys on
/// [`META_DELIMITER`].
///
/// # Errors
///
/// Returns [`DbError::Validation`] if a key is both a leaf and a parent
/// (`owner` and `owner.id`).
pub fn unflatten(flat: &FlatMetadata) -> Result<serde_json::Value> {
    let mut root = serde_json::Map::new();
    for (key, value) in flat {
        let mut segments = key.split(META_DELIMITER).peekable();
        let mut node = &mut root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if node.contains_key(segment) {
                    return Err(DbError::validation(key, "key collides with a nested record"));
                }
                node.insert(segment.to_string(), serde_json::to_value(value)?);
                break;
            }
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            node = child
                .as_object_mut()
                .ok_or_else(|| DbError::validation(key, "key collides with a scalar value"))?;
        }
    }
    Ok(serde_json::Value::Object(root))
}

fn path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() { field.to_string() } else { format!("{prefix}{META_DELIMITER}{field}") }
}

fn put(out: &mut FlatMetadata, prefix: &str, field: &str, value: impl Into<MetadataValue>) {
    out.insert(path(prefix, field), value.into());
}

fn read_required_str(flat: &FlatMetadata, key: &str) -> Result<String> {
    match flat.get(key) {
        Some(MetadataValue::Str(s)) => Ok(s.clone()),
        Some(other) => Err(DbError::validation(
            key,
            format!("expected string, found {}", other.type_name()),
        )),
        None => Err(DbError::validation(key, "missing required field")),
    }
}

fn read_optional_str(flat: &FlatMetadata, key: &str) -> Result<String> {
    if flat.contains_key(key) { read_required_str(flat, key) } else { Ok(String::new()) }
}

fn read_kind<K: FromStr<Err = DbError>>(flat: &FlatMetadata, key: &str) -> Result<K> {
    let raw = read_required_str(flat, key)?;
    raw.parse::<K>().map_err(|e| match e {
        DbError::Validation { message, .. } => DbError::validation(key, message),
        other => other,
    })
}

fn read_timestamp(flat: &FlatMetadata, key: &str) -> Result<Timestamp> {
    let parsed = match flat.get(key) {
        Some(MetadataValue::Float(secs)) => Timestamp::from_epoch_seconds(*secs),
        Some(MetadataValue::Int(secs)) => DateTime::from_timestamp(*secs, 0).map(Timestamp::new),
        Some(MetadataValue::Str(s)) => {
            DateTime::parse_from_rfc3339(s).ok().map(|dt| Timestamp::new(dt.with_timezone(&Utc)))
        }
        Some(MetadataValue::Bool(_)) => None,
        None => return Err(DbError::validation(key, "missing required field")),
    };
    parsed.ok_or_else(|| DbError::validation(key, "not a valid timestamp"))
}

impl FlatRecord for EntityMeta {
    fn write_flat(&self, prefix: &str, out: &mut FlatMetadata) {
        put(out, prefix, "created_datetime", self.created_datetime.to_epoch_seconds());
        put(out, prefix, "type", self.kind.as_str());
        put(out, prefix, "name", self.name.as_str());
        put(out, prefix, "id", self.id.as_str());
    }

    fn read_flat(flat: &FlatMetadata, prefix: &str) -> Result<Self> {
        Ok(Self {
            created_datetime: read_timestamp(flat, &path(prefix, "created_datetime"))?,
            kind: read_kind::<EntityKind>(flat, &path(prefix, "type"))?,
            name: read_optional_str(flat, &path(prefix, "name"))?,
            id: read_required_str(flat, &path(prefix, "id"))?,
        })
    }
}

impl FlatRecord for SourceMeta {
    fn write_flat(&self, prefix: &str, out: &mut FlatMetadata) {
        put(out, prefix, "created_datetime", self.created_datetime.to_epoch_seconds());
        put(out, prefix, "type", self.kind.as_str());
        put(out, prefix, "ref", self.reference.as_str());
        put(out, prefix, "url", self.url.as_str());
    }

    fn read_flat(flat: &FlatMetadata, prefix: &str) -> Result<Self> {
        Ok(Self {
            created_datetime: read_timestamp(flat, &path(prefix, "created_datetime"))?,
            kind: read_kind::<SourceKind>(flat, &path(prefix, "type"))?,
            reference: read_optional_str(flat, &path(prefix, "ref"))?,
            url: read_optional_str(flat, &path(prefix, "url"))?,
        })
    }
}

impl FlatRecord for DataMeta {
    fn write_flat(&self, prefix: &str, out: &mut FlatMetadata) {
        put(out, prefix, "created_datetime", self.created_datetime.to_epoch_seconds());
        put(out, prefix, "type", self.kind.as_str());
        self.owner.write_flat(&path(prefix, "owner"), out);
        self.creator.write_flat(&path(prefix, "creator"), out);
        self.source.write_flat(&path(prefix, "source"), out);
    }

    fn read_flat(flat: &FlatMetadata, prefix: &str) -> Result<Self> {
        Ok(Self {
            created_datetime: read_timestamp(flat, &path(prefix, "created_datetime"))?,
            kind: read_kind::<DataKind>(flat, &path(prefix, "type"))?,
            owner: EntityMeta::read_flat(flat, &path(prefix, "owner"))?,
            creator: EntityMeta::read_flat(flat, &path(prefix, "creator"))?,
            source: SourceMeta::read_flat(flat, &path(prefix, "source"))?,
        })
    }
}
