//! Partition table: maps the HKey space onto cluster members.
//!
//! The keyspace is divided into a fixed number of partitions. Each
//! partition carries an ordered owners history (last entry is the current
//! primary, earlier entries are previous primaries awaiting rebalancing)
//! and a list of current backup owners.
//!
//! The table is read-mostly: readers grab an `Arc` snapshot and consult it
//! without holding any lock, writers build a new map and swap it in.

use shardmap_common::{hkey, rendezvous_weight, Member};
use std::sync::{Arc, RwLock};

/// One fixed-index shard of the hash space.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Primary ownership history in temporal order. The last element is
    /// the current primary; earlier elements still hold data until the
    /// rebalancer drains them.
    pub owners: Vec<Member>,
    /// Current backup owners.
    pub backups: Vec<Member>,
}

#[derive(Debug)]
struct PartitionMap {
    partitions: Vec<Partition>,
}

/// Cluster-wide partition ownership, shared across the node.
#[derive(Debug)]
pub struct PartitionTable {
    partition_count: u64,
    inner: RwLock<Arc<PartitionMap>>,
}

impl PartitionTable {
    /// An empty table: every partition starts with no owners.
    pub fn new(partition_count: u64) -> Self {
        assert!(partition_count > 0, "partition_count must be > 0");
        let partitions = vec![Partition::default(); partition_count as usize];
        Self {
            partition_count,
            inner: RwLock::new(Arc::new(PartitionMap { partitions })),
        }
    }

    pub fn partition_count(&self) -> u64 {
        self.partition_count
    }

    /// The partition a fingerprint routes to.
    pub fn partition_id(&self, hkey: u64) -> u64 {
        hkey % self.partition_count
    }

    fn snapshot(&self) -> Arc<PartitionMap> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The ownership history of the partition a fingerprint routes to.
    pub fn owners(&self, hkey: u64) -> Vec<Member> {
        let map = self.snapshot();
        map.partitions[self.partition_id(hkey) as usize].owners.clone()
    }

    /// Current backup owners of the partition a fingerprint routes to.
    pub fn backups(&self, hkey: u64) -> Vec<Member> {
        let map = self.snapshot();
        map.partitions[self.partition_id(hkey) as usize]
            .backups
            .clone()
    }

    /// Compute a key's fingerprint and resolve its current primary owner.
    ///
    /// Panics if the partition has no owners: a routable key without an
    /// owner is a programming error, not a runtime condition.
    pub fn find_partition_owner(&self, name: &str, key: &str) -> (Member, u64) {
        let hkey = hkey(name, key);
        let owners = self.owners(hkey);
        let primary = owners
            .last()
            .copied()
            .expect("partition owners list cannot be empty");
        (primary, hkey)
    }

    /// Replace one partition's ownership wholesale. Bootstrap/test helper.
    pub fn set_partition(&self, index: u64, owners: Vec<Member>, backups: Vec<Member>) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut partitions = guard.partitions.clone();
        partitions[index as usize] = Partition { owners, backups };
        *guard = Arc::new(PartitionMap { partitions });
    }

    /// Recompute placement for the given member set.
    ///
    /// Placement is rendezvous hashing: for each partition, members are
    /// ranked by their weight for that partition; the top-ranked member is
    /// the primary, the next `replica_count - 1` are backups. Every node
    /// computes the same ranking, so tables agree without coordination.
    ///
    /// A changed primary is appended to the owners history; the previous
    /// primary stays listed until `compact_owners` is called for the
    /// partition (the rebalancer's job, once it has drained the old copy).
    pub fn rebuild(&self, members: &[Member], replica_count: usize) {
        assert!(!members.is_empty(), "cannot rebuild with no members");
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut partitions = guard.partitions.clone();

        for (index, partition) in partitions.iter_mut().enumerate() {
            let mut ranked: Vec<Member> = members.to_vec();
            ranked.sort_by_key(|m| std::cmp::Reverse(rendezvous_weight(m, index as u64)));

            let primary = ranked[0];
            if partition.owners.last() != Some(&primary) {
                // Forget stale history entries for the member that just
                // became primary again; it is current, not previous.
                partition.owners.retain(|m| *m != primary);
                partition.owners.push(primary);
            }
            partition.backups = ranked
                .into_iter()
                .skip(1)
                .take(replica_count.saturating_sub(1))
                .collect();
        }

        *guard = Arc::new(PartitionMap { partitions });
    }

    /// Collapse a partition's owners history to just the current primary.
    /// Called by the rebalancer once previous owners are drained.
    pub fn compact_owners(&self, index: u64) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut partitions = guard.partitions.clone();
        let partition = &mut partitions[index as usize];
        if let Some(primary) = partition.owners.last().copied() {
            partition.owners = vec![primary];
        }
        *guard = Arc::new(PartitionMap { partitions });
    }
}
