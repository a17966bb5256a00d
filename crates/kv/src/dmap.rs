//! DMap: one named keyspace within a partition.
//!
//! A DMap owns the local storage table for its (partition, dmap) pair and
//! the access log used for idleness eviction. One reader/writer lock guards
//! both; the access log additionally carries its own inner mutex so the
//! primary can refresh last-access timestamps while the outer lock is held
//! for reading.

use shardmap_common::now_nanos;
use shardmap_storage::{Table, VData};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

/// A write applied through the local write path.
#[derive(Debug, Clone)]
pub struct WriteOp {
    pub key: String,
    pub value: Vec<u8>,
    /// Original write timestamp. Replica and repair writes carry the
    /// winner's timestamp, not the local clock.
    pub timestamp: i64,
    /// Absolute expiry in nanoseconds since epoch, 0 for none.
    pub ttl: i64,
}

/// The stored record has a newer or equal timestamp than the write.
#[derive(Debug, thiserror::Error)]
#[error("write is stale: stored record has a newer or equal timestamp")]
pub struct StaleWrite;

/// Last-access bookkeeping per HKey.
///
/// The inner mutex is never held across an await point; it only exists so
/// `touch` can run under the DMap *read* lock.
#[derive(Debug, Default)]
pub struct AccessLog {
    entries: Mutex<HashMap<u64, i64>>,
}

impl AccessLog {
    /// Record an access at `now`.
    pub fn touch(&self, hkey: u64, now: i64) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(hkey, now);
    }

    /// The last recorded access, if any.
    pub fn last_access(&self, hkey: u64) -> Option<i64> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&hkey).copied()
    }

    pub fn remove(&self, hkey: u64) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(&hkey);
    }
}

/// State guarded by the DMap lock.
#[derive(Debug, Default)]
pub struct DMapInner {
    pub storage: Table,
    pub access_log: AccessLog,
}

impl DMapInner {
    /// Whether a key has gone untouched longer than `max_idle`.
    ///
    /// A zero `max_idle` disables idleness; so does a key that was never
    /// read since it landed here (it has no access-log entry yet).
    pub fn is_key_idle(&self, hkey: u64, max_idle: Duration, now: i64) -> bool {
        if max_idle.is_zero() {
            return false;
        }
        match self.access_log.last_access(hkey) {
            Some(last) => now.saturating_sub(last) >= max_idle.as_nanos() as i64,
            None => false,
        }
    }

    /// Refresh the last-access timestamp. Only the current primary calls
    /// this, and only after a successful, non-expired read.
    pub fn update_access_log(&self, hkey: u64) {
        self.access_log.touch(hkey, now_nanos());
    }

    /// Local write path. Rejects writes that do not advance the stored
    /// record's timestamp so late repair traffic cannot clobber a
    /// concurrent newer write.
    pub fn local_put(&mut self, hkey: u64, op: WriteOp) -> Result<(), StaleWrite> {
        if let Some(existing) = self.storage.get(hkey) {
            if existing.timestamp >= op.timestamp {
                return Err(StaleWrite);
            }
        }
        self.storage
            .put(hkey, VData::new(op.key, op.value, op.timestamp, op.ttl));
        self.access_log.touch(hkey, now_nanos());
        Ok(())
    }
}

/// A named keyspace within one partition.
#[derive(Debug)]
pub struct DMap {
    pub name: String,
    pub inner: RwLock<DMapInner>,
}

impl DMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(DMapInner::default()),
        }
    }
}
