//! Content-addressed identifiers for metadata records.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::meta::MetaData;

/// Separator between the two digests of an identifier.
pub const ID_SEPARATOR: char = ':';

/// Derive the storage identifier of a metadata record.
///
/// The record is encoded as compact JSON in field declaration order with
/// numeric timestamps. The identifier is the SHA-256 hex digest of those
/// bytes followed by [`ID_SEPARATOR`] and the BLAKE3 hex digest, so records
/// with identical field values always map to the same identifier.
pub fn meta_identifier<M: MetaData>(meta: &M) -> Result<String> {
    let encoded = serde_json::to_vec(meta)?;
    let primary = format!("{:x}", Sha256::digest(&encoded));
    let secondary = blake3::hash(&encoded).to_hex();
    Ok(format!("{primary}{ID_SEPARATOR}{secondary}"))
}
