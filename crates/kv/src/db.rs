//! Client-facing handles over the coordinator.
//!
//! `Db::dmap(name)` yields a handle bound to one named keyspace. Raw reads
//! and writes move opaque bytes; `get_as`/`put_value` are the only places
//! user values are (de)serialised — cluster-internal traffic stays raw.

use crate::coordinator::{KvCoordinator, KvError};
use crate::peer_client::PeerClient;
use std::sync::Arc;
use std::time::Duration;

/// Entry point for client access to a node's keyspaces.
pub struct Db<C: PeerClient> {
    coordinator: Arc<KvCoordinator<C>>,
}

impl<C: PeerClient> std::fmt::Debug for Db<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl<C: PeerClient> Db<C> {
    pub fn new(coordinator: Arc<KvCoordinator<C>>) -> Self {
        Self { coordinator }
    }

    /// A handle bound to one named keyspace.
    pub fn dmap(&self, name: impl Into<String>) -> DmapHandle<C> {
        DmapHandle {
            name: name.into(),
            coordinator: self.coordinator.clone(),
        }
    }
}

/// One named keyspace. Cheap to clone and safe to share across tasks.
pub struct DmapHandle<C: PeerClient> {
    name: String,
    coordinator: Arc<KvCoordinator<C>>,
}

impl<C: PeerClient> Clone for DmapHandle<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<C: PeerClient> std::fmt::Debug for DmapHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmapHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<C: PeerClient> DmapHandle<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GET the raw value bytes stored under a key.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, KvError> {
        self.coordinator.get(&self.name, key).await
    }

    /// GET and decode a typed value.
    pub async fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, KvError> {
        let raw = self.get(key).await?;
        Ok(shardmap_protocol::decode(&raw)?)
    }

    /// PUT raw value bytes with no expiry.
    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        self.coordinator.put(&self.name, key, value).await
    }

    /// PUT raw value bytes that expire `ttl` from now.
    pub async fn put_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError> {
        self.coordinator.put_ex(&self.name, key, value, ttl).await
    }

    /// Encode and PUT a typed value.
    pub async fn put_value<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), KvError> {
        let raw = shardmap_protocol::encode(value)?;
        self.put(key, raw).await
    }
}
