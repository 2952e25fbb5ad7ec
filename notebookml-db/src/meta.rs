//! Provenance metadata records and the stored [`Data`] unit.
//!
//! Every record carries a `created_datetime`. On the wire it is a numeric
//! epoch timestamp in seconds; in memory it is a [`Timestamp`], which only
//! holds values that survive the float encoding exactly.
//!
//! The `type` fields are closed enumerations ([`EntityKind`], [`SourceKind`],
//! [`DataKind`]). Parsing an unknown value fails with
//! [`DbError::Validation`].

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DbError, Result};

/// Timestamps with `|epoch seconds| < 2^32` (years 1833 to 2106) keep
/// microseconds; an `f64` cannot resolve microsecond steps much further out.
pub const MICROSECOND_RANGE_SECS: i64 = 1 << 32;

/// A creation time held at the precision the numeric wire form carries.
///
/// Every constructor normalizes: sub-microsecond digits are dropped, and
/// outside [`MICROSECOND_RANGE_SECS`] the value is truncated to whole
/// seconds. Converting to epoch seconds and back is therefore exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Normalize `dt` to wire precision.
    pub fn new(dt: DateTime<Utc>) -> Self {
        if dt.timestamp().unsigned_abs() < MICROSECOND_RANGE_SECS.unsigned_abs() {
            Self(dt.trunc_subsecs(6))
        } else {
            Self(dt.trunc_subsecs(0))
        }
    }

    /// The current time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// The underlying date-time.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Fractional epoch seconds.
    pub fn to_epoch_seconds(&self) -> f64 {
        self.0.timestamp() as f64 + f64::from(self.0.timestamp_subsec_micros()) / 1_000_000.0
    }

    /// Parse fractional epoch seconds, rounding the fraction to the nearest
    /// microsecond. Returns `None` for non-finite or out-of-range input.
    pub fn from_epoch_seconds(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
            return None;
        }
        let micros = ((secs - whole) * 1_000_000.0).round() as i64;
        DateTime::from_timestamp(whole as i64, 0)?
            .checked_add_signed(TimeDelta::microseconds(micros))
            .map(Self::new)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::new(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Writes epoch seconds.
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_epoch_seconds())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Numeric(f64),
    Structured(DateTime<Utc>),
}

/// Reads epoch seconds (float or integer) or an RFC 3339 date-time.
impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Numeric(secs) => Self::from_epoch_seconds(secs)
                .ok_or_else(|| D::Error::custom(format!("timestamp {secs} is out of range"))),
            RawTimestamp::Structured(dt) => Ok(Self::new(dt)),
        }
    }
}

macro_rules! closed_kind {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )+
        }

        impl $name {
            /// All accepted wire values, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            /// The wire value of this kind.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DbError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(DbError::validation(
                        "type",
                        format!("'{other}' is not one of {:?}", Self::VALUES),
                    )),
                }
            }
        }
    };
}

closed_kind! {
    /// Kind of an entity that owns or creates data.
    EntityKind { Undef => "undef", User => "user", Agent => "agent" }
}

closed_kind! {
    /// Provenance of a data item.
    SourceKind { User => "user", Document => "document", Website => "website" }
}

closed_kind! {
    /// Kind of a stored entry.
    DataKind { Data => "data", Content => "content" }
}

/// Behaviour shared by every metadata record.
///
/// [`to_value`](MetaData::to_value) produces the nested JSON-like mapping with
/// numeric timestamps; [`from_value`](MetaData::from_value) accepts the same
/// mapping (or one with structured timestamps) and rejects shape mismatches.
pub trait MetaData: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync {
    /// Record name used in validation error paths.
    const RECORD: &'static str;

    /// When the record was created.
    fn created_datetime(&self) -> Timestamp;

    /// Serialize into a nested mapping.
    fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a nested mapping.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] if a required field is missing, a kind
    /// is outside its closed set, or a value has the wrong type.
    fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| DbError::validation(Self::RECORD, e.to_string()))
    }
}

/// Metadata for a user or agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Creation time of the entity record.
    pub created_datetime: Timestamp,
    /// Kind of the entity.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Display name, meaningful for agents.
    #[serde(default)]
    pub name: String,
    /// Unique identifier of the entity.
    pub id: String,
}

/// Placeholder for an owner or creator that is not known yet.
pub static NULL_ENTITY: LazyLock<EntityMeta> = LazyLock::new(|| EntityMeta {
    created_datetime: DateTime::from_timestamp(946_684_800, 0).unwrap_or_default().into(),
    kind: EntityKind::Undef,
    name: "null".to_string(),
    id: String::new(),
});

impl EntityMeta {
    /// Create an entity of the given kind, stamped with the current time.
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            created_datetime: Timestamp::now(),
            kind,
            name: String::new(),
            id: id.into(),
        }
    }

    /// Create a user entity.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(EntityKind::User, id)
    }

    /// Create a named agent entity.
    pub fn agent(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(EntityKind::Agent, id).with_name(name)
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the creation time.
    pub fn created_at(mut self, at: impl Into<Timestamp>) -> Self {
        self.created_datetime = at.into();
        self
    }

    /// Whether this is the [`NULL_ENTITY`] placeholder.
    pub fn is_null(&self) -> bool {
        *self == *NULL_ENTITY
    }
}

impl MetaData for EntityMeta {
    const RECORD: &'static str = "EntityMeta";

    fn created_datetime(&self) -> Timestamp {
        self.created_datetime
    }
}

/// Metadata describing where a data item came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Creation time of the source record.
    pub created_datetime: Timestamp,
    /// Kind of the source.
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Document reference, populated for [`SourceKind::Document`].
    #[serde(rename = "ref", default)]
    pub reference: String,
    /// URL, populated for [`SourceKind::Website`].
    #[serde(default)]
    pub url: String,
}

impl SourceMeta {
    fn with_kind(kind: SourceKind) -> Self {
        Self {
            created_datetime: Timestamp::now(),
            kind,
            reference: String::new(),
            url: String::new(),
        }
    }

    /// Content authored directly by a user.
    pub fn user() -> Self {
        Self::with_kind(SourceKind::User)
    }

    /// Content extracted from a document.
    pub fn document(reference: impl Into<String>) -> Self {
        Self { reference: reference.into(), ..Self::with_kind(SourceKind::Document) }
    }

    /// Content fetched from a website.
    pub fn website(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::with_kind(SourceKind::Website) }
    }

    /// Override the creation time.
    pub fn created_at(mut self, at: impl Into<Timestamp>) -> Self {
        self.created_datetime = at.into();
        self
    }
}

impl MetaData for SourceMeta {
    const RECORD: &'static str = "SourceMeta";

    fn created_datetime(&self) -> Timestamp {
        self.created_datetime
    }
}

/// Metadata for a stored entry: who owns it, who created it, where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMeta {
    /// Creation time of the entry.
    pub created_datetime: Timestamp,
    /// Kind of the entry.
    #[serde(rename = "type")]
    pub kind: DataKind,
    /// Owner of the entry.
    pub owner: EntityMeta,
    /// Creator of the entry.
    pub creator: EntityMeta,
    /// Provenance of the entry.
    pub source: SourceMeta,
}

impl DataMeta {
    /// Create entry metadata stamped with the current time.
    pub fn new(kind: DataKind, owner: EntityMeta, creator: EntityMeta, source: SourceMeta) -> Self {
        Self { created_datetime: Timestamp::now(), kind, owner, creator, source }
    }

    /// Override the creation time.
    pub fn created_at(mut self, at: impl Into<Timestamp>) -> Self {
        self.created_datetime = at.into();
        self
    }
}

impl MetaData for DataMeta {
    const RECORD: &'static str = "DataMeta";

    fn created_datetime(&self) -> Timestamp {
        self.created_datetime
    }
}

/// A text payload with its metadata. The unit that is stored and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// Metadata for the entry.
    pub meta: DataMeta,
    /// The text content (a passage, a chat message, ...).
    pub content: String,
}

impl Data {
    /// Pair metadata with content.
    pub fn new(meta: DataMeta, content: impl Into<String>) -> Self {
        Self { meta, content: content.into() }
    }
}
