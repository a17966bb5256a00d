//! shardmap-kv: the replicated read path.
//!
//! Provides: per-partition DMap handles, version collection across the
//! owner chain and backup set, quorum reconciliation with last-write-wins
//! ordering, expiry/idleness gating, read repair, the peer-side RPC
//! handlers, and the typed client boundary (`Db` / `DmapHandle`).

pub mod coordinator;
pub mod db;
pub mod dmap;
pub mod handlers;
pub mod lookup;
pub mod peer_client;
pub mod registry;
pub mod repair;
pub mod version;
