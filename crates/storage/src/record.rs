//! Storage record format.

use serde::{Deserialize, Serialize};

/// A stored key/value pair with its ordering metadata.
///
/// This is also the wire payload of GET-PREV and GET-BACKUP responses, so
/// the field set and their msgpack encoding must round-trip byte-exact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VData {
    /// The original user key.
    pub key: String,
    /// Opaque value bytes.
    pub value: Vec<u8>,
    /// Monotonic write time, nanoseconds since epoch at the writer.
    pub timestamp: i64,
    /// Absolute expiry time in nanoseconds since epoch. 0 means no expiry.
    pub ttl: i64,
}

impl VData {
    pub fn new(key: String, value: Vec<u8>, timestamp: i64, ttl: i64) -> Self {
        Self {
            key,
            value,
            timestamp,
            ttl,
        }
    }
}

/// Whether an absolute TTL deadline has passed at `now`.
///
/// A zero TTL never expires.
pub fn is_expired(ttl: i64, now: i64) -> bool {
    ttl != 0 && now >= ttl
}
