//! shardmap-common: shared types for the shardmap project.
//!
//! Provides the `Member` identity used for partition ownership and the
//! `HKey` fingerprint that maps a `(dmap, key)` pair into the partition
//! space.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::net::SocketAddr;

// ---------------------------------------------------------------------------
// HKey
// ---------------------------------------------------------------------------

/// 64-bit fingerprint of a `(dmap-name, user-key)` pair.
///
/// Used for partition routing and as the local storage index. The same
/// inputs produce the same value on every node: the fingerprint is the
/// first 8 bytes of `SHA-1(name || 0x00 || key)`, read big-endian.
pub fn hkey(name: &str, key: &str) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// 64-bit rendezvous weight of a `(member, partition)` pair.
///
/// Every node computes identical weights, so partition placement derived
/// from them agrees cluster-wide without coordination.
pub fn rendezvous_weight(member: &Member, partition: u64) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(member.addr.to_string().as_bytes());
    hasher.update(partition.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A cluster peer.
///
/// Two members are the same peer only if both the address and the birthdate
/// match: a process restarted on the same address is a different member and
/// must not be treated as a surviving owner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// The peer's RPC listen address.
    pub addr: SocketAddr,
    /// Process start time, nanoseconds since epoch.
    pub birthdate: i64,
}

impl Member {
    pub fn new(addr: SocketAddr, birthdate: i64) -> Self {
        Self { addr, birthdate }
    }

    /// A member with a zero birthdate, for statically configured peers
    /// whose start time is unknown.
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self { addr, birthdate: 0 }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member({})", self.addr)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock time in nanoseconds since the Unix epoch.
///
/// Write timestamps and TTL deadlines are expressed in this unit.
pub fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
