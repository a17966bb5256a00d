//! In-memory table keyed by HKey.

use crate::record::{is_expired, VData};
use std::collections::HashMap;

/// HKey-indexed in-memory store for one (partition, dmap) pair.
///
/// Lookups are O(1) and never block. Expiry is metadata only: `get` returns
/// expired entries as-is, the read path decides what an expired record means.
#[derive(Debug, Default)]
pub struct Table {
    entries: HashMap<u64, VData>,
}

impl Table {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get the record stored under an HKey, expired or not.
    pub fn get(&self, hkey: u64) -> Option<&VData> {
        self.entries.get(&hkey)
    }

    /// Store a record, replacing any previous one under the same HKey.
    pub fn put(&mut self, hkey: u64, data: VData) {
        self.entries.insert(hkey, data);
    }

    /// Remove a record.
    pub fn remove(&mut self, hkey: u64) -> Option<VData> {
        self.entries.remove(&hkey)
    }

    /// Drop every record whose TTL deadline has passed.
    /// Returns the removed HKeys so callers can clear their bookkeeping.
    pub fn remove_expired(&mut self, now: i64) -> Vec<u64> {
        let dead: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, d)| is_expired(d.ttl, now))
            .map(|(hkey, _)| *hkey)
            .collect();
        for hkey in &dead {
            self.entries.remove(hkey);
        }
        dead
    }

    /// Number of records, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
