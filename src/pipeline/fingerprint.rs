//! Content fingerprints for change detection.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of the decoded
//! rooms. Object keys are sorted and the output is compact, so the digest only
//! depends on content. Decode timestamps are left out: they change on every
//! pass even when the sheet does not.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::Room;

/// Wire name of the per-room decode timestamp.
const DECODE_TIMESTAMP_KEY: &str = "last_updated";

/// Lowercase hex SHA-256 digest of a room collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical JSON value of one room, without its decode timestamp.
///
/// `serde_json::Map` is ordered by key, so every nested object comes out sorted.
pub fn canonical_room(room: &Room) -> Result<Value> {
    let mut value = serde_json::to_value(room)?;
    if let Value::Object(map) = &mut value {
        map.remove(DECODE_TIMESTAMP_KEY);
    }
    Ok(value)
}

/// Canonical compact serialization of a collection. Room order is kept.
pub fn canonical_json(rooms: &[Room]) -> Result<String> {
    let values = rooms
        .iter()
        .map(canonical_room)
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::to_string(&values)?)
}

/// Compute the fingerprint of a collection.
pub fn fingerprint(rooms: &[Room]) -> Result<Fingerprint> {
    let canonical = canonical_json(rooms)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}
