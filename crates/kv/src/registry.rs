//! Per-partition DMap tables.
//!
//! Each partition holds two independent name→DMap tables: one for data this
//! node serves as primary (or held as a previous primary), one for data it
//! holds as a backup owner. Handles are created lazily on first touch.

use crate::dmap::DMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct PartitionMaps {
    primary: RwLock<HashMap<String, Arc<DMap>>>,
    backup: RwLock<HashMap<String, Arc<DMap>>>,
}

/// All DMap handles held by this node, indexed by partition.
#[derive(Debug)]
pub struct DMapRegistry {
    partitions: Vec<PartitionMaps>,
}

impl DMapRegistry {
    pub fn new(partition_count: u64) -> Self {
        let partitions = (0..partition_count).map(|_| PartitionMaps::default()).collect();
        Self { partitions }
    }

    /// Get or create the primary-table DMap for `(partition, name)`.
    pub async fn primary_dmap(&self, partition_id: u64, name: &str) -> Arc<DMap> {
        Self::get_or_create(&self.partitions[partition_id as usize].primary, name).await
    }

    /// Get or create the backup-table DMap for `(partition, name)`.
    pub async fn backup_dmap(&self, partition_id: u64, name: &str) -> Arc<DMap> {
        Self::get_or_create(&self.partitions[partition_id as usize].backup, name).await
    }

    /// Look up a primary-table DMap without creating it.
    pub async fn get_primary(&self, partition_id: u64, name: &str) -> Option<Arc<DMap>> {
        let table = self.partitions[partition_id as usize].primary.read().await;
        table.get(name).cloned()
    }

    /// Look up a backup-table DMap without creating it.
    pub async fn get_backup(&self, partition_id: u64, name: &str) -> Option<Arc<DMap>> {
        let table = self.partitions[partition_id as usize].backup.read().await;
        table.get(name).cloned()
    }

    /// Every DMap handle on this node, both tables. Used by the expiry
    /// janitor.
    pub async fn all_dmaps(&self) -> Vec<Arc<DMap>> {
        let mut out = Vec::new();
        for maps in &self.partitions {
            out.extend(maps.primary.read().await.values().cloned());
            out.extend(maps.backup.read().await.values().cloned());
        }
        out
    }

    async fn get_or_create(table: &RwLock<HashMap<String, Arc<DMap>>>, name: &str) -> Arc<DMap> {
        {
            let read = table.read().await;
            if let Some(dm) = read.get(name) {
                return dm.clone();
            }
        }
        let mut write = table.write().await;
        write
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DMap::new(name)))
            .clone()
    }
}
