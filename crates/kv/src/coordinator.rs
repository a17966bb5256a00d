//! KV coordinator: the cluster-wide GET pipeline and request router.
//!
//! A GET on the partition owner:
//! 1. Collects versions from the local store, previous partition owners,
//!    and (when the quorum asks for them) the backup owners
//! 2. Enforces the read quorum and picks a winner by timestamp order
//! 3. Gates the winner on expiry and idleness
//! 4. Refreshes the access log and replies
//! 5. Optionally propagates the winner to stale copies (read repair)
//!
//! A GET anywhere else forwards to the owner and returns its response
//! verbatim.

use crate::dmap::{StaleWrite, WriteOp};
use crate::peer_client::{PeerClient, TransportError};
use crate::registry::DMapRegistry;
use crate::version::sanitize_and_sort;
use shardmap_cluster::PartitionTable;
use shardmap_common::{now_nanos, Member};
use shardmap_protocol::{CodecError, Extra, OpCode, Request, Status};
use shardmap_storage::is_expired;
use std::sync::Arc;
use std::time::Duration;

/// Read/replication configuration.
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Minimum number of responses a read needs before it may succeed.
    pub read_quorum: usize,
    /// Copies kept per partition (primary + backups).
    pub replica_count: usize,
    /// Backups are consulted on reads only when
    /// `read_quorum >= min_replica_count`.
    pub min_replica_count: usize,
    /// Whether to propagate the winner to stale copies after a read.
    pub read_repair: bool,
    /// Keys untouched for this long count as evicted. Zero disables.
    pub max_idle: Duration,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            read_quorum: 1,
            replica_count: 1,
            min_replica_count: 2,
            read_repair: true,
            max_idle: Duration::ZERO,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("key not found")]
    KeyNotFound,
    #[error("read quorum cannot be reached")]
    ReadQuorum,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Stale(#[from] StaleWrite),
    #[error("remote error: {0}")]
    Remote(String),
}

/// Translate a peer's error status into the matching client error.
pub(crate) fn status_error(status: Status) -> KvError {
    match status {
        Status::ErrKeyNotFound => KvError::KeyNotFound,
        Status::ErrReadQuorum => KvError::ReadQuorum,
        Status::Ok | Status::ErrInternal => KvError::Remote(format!("{:?}", status)),
    }
}

/// Distributed KV coordinator.
///
/// Generic over `C: PeerClient` for testability — real deployment uses the
/// TCP client from `shardmap-net`; unit tests use a mock.
pub struct KvCoordinator<C: PeerClient> {
    pub(crate) this: Member,
    pub(crate) partitions: Arc<PartitionTable>,
    pub(crate) registry: Arc<DMapRegistry>,
    pub(crate) client: Arc<C>,
    pub(crate) config: KvConfig,
}

impl<C: PeerClient> std::fmt::Debug for KvCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCoordinator")
            .field("this", &self.this)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: PeerClient> KvCoordinator<C> {
    pub fn new(
        this: Member,
        partitions: Arc<PartitionTable>,
        registry: Arc<DMapRegistry>,
        client: Arc<C>,
        config: KvConfig,
    ) -> Self {
        Self {
            this,
            partitions,
            registry,
            client,
            config,
        }
    }

    pub fn local_member(&self) -> Member {
        self.this
    }

    pub fn registry(&self) -> &Arc<DMapRegistry> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // GET
    // -----------------------------------------------------------------------

    /// GET a key. Runs the reconciliation pipeline if this node owns the
    /// key's partition, otherwise forwards to the owner.
    pub async fn get(&self, name: &str, key: &str) -> Result<Vec<u8>, KvError> {
        let m = shardmap_metrics::metrics();
        m.dmap_gets.inc();
        let _timer = shardmap_metrics::start_dmap_timer("get");

        let (owner, hkey) = self.partitions.find_partition_owner(name, key);
        if owner == self.this {
            return self.call_get_on_cluster(hkey, name, key).await;
        }

        // Redirect to the partition owner and relay its answer verbatim.
        m.dmap_get_forwards.inc();
        let resp = self
            .client
            .request(&owner, OpCode::Get, Request::new(name, key))
            .await?;
        match resp.status {
            Status::Ok => Ok(resp.value.unwrap_or_default()),
            status => Err(status_error(status)),
        }
    }

    /// The reconciliation pipeline, executed on the partition owner.
    pub(crate) async fn call_get_on_cluster(
        &self,
        hkey: u64,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, KvError> {
        let partition_id = self.partitions.partition_id(hkey);
        let dm = self.registry.primary_dmap(partition_id, name).await;

        let guard = dm.inner.read().await;

        let mut versions = self.lookup_on_owners(&guard, hkey, name, key).await;
        if self.config.read_quorum >= self.config.min_replica_count {
            versions.extend(self.lookup_on_replicas(hkey, name, key).await);
        }

        // Too few responses is a different failure than unanimous absence,
        // and it is checked first: a raw response with no data still
        // counts toward the quorum.
        if versions.len() < self.config.read_quorum {
            return Err(KvError::ReadQuorum);
        }
        let mut sorted = sanitize_and_sort(&versions);
        if sorted.is_empty() {
            // We checked everywhere, it's not here.
            return Err(KvError::KeyNotFound);
        }
        if sorted.len() < self.config.read_quorum {
            return Err(KvError::ReadQuorum);
        }

        // The most up-to-date version of the value.
        let winner = sorted.swap_remove(0);
        let Some(win_data) = winner.data.clone() else {
            return Err(KvError::KeyNotFound);
        };
        if is_expired(win_data.ttl, now_nanos())
            || guard.is_key_idle(hkey, self.config.max_idle, now_nanos())
        {
            return Err(KvError::KeyNotFound);
        }
        // Eviction bookkeeping lives on the partition owner only. Copies
        // on previous owners and backups are shadows and never refresh
        // the access log.
        guard.update_access_log(hkey);

        // The read guard must go before repair is dispatched: a repair
        // that targets this host re-enters the same DMap for the write
        // lock.
        drop(guard);

        if self.config.read_repair {
            // Parallel reads may have propagated different versions of
            // the same pair. Last write wins.
            self.spawn_read_repair(name, dm, hkey, winner, versions);
        }
        Ok(win_data.value)
    }

    // -----------------------------------------------------------------------
    // PUT
    // -----------------------------------------------------------------------

    /// PUT a value with no expiry.
    pub async fn put(&self, name: &str, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        self.put_with_deadline(name, key, value, 0).await
    }

    /// PUT a value that expires `ttl` from now.
    pub async fn put_ex(
        &self,
        name: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let deadline = now_nanos() + ttl.as_nanos() as i64;
        self.put_with_deadline(name, key, value, deadline).await
    }

    /// Route a write to the partition owner. `deadline` is the absolute
    /// expiry in nanoseconds, 0 for none.
    pub(crate) async fn put_with_deadline(
        &self,
        name: &str,
        key: &str,
        value: Vec<u8>,
        deadline: i64,
    ) -> Result<(), KvError> {
        let m = shardmap_metrics::metrics();
        m.dmap_puts.inc();
        let _timer = shardmap_metrics::start_dmap_timer("put");

        let (owner, hkey) = self.partitions.find_partition_owner(name, key);
        if owner == self.this {
            return self.put_on_cluster(hkey, name, key, value, deadline).await;
        }

        let op = if deadline == 0 {
            OpCode::Put
        } else {
            OpCode::PutEx
        };
        let mut req = Request::new(name, key).with_value(value);
        if deadline != 0 {
            req = req.with_extra(Extra::PutEx {
                timestamp: 0,
                ttl: deadline,
            });
        }
        let resp = self.client.request(&owner, op, req).await?;
        match resp.status {
            Status::Ok => Ok(()),
            status => Err(status_error(status)),
        }
    }

    /// Owner-side write: stamp a timestamp, apply locally, distribute to
    /// backups best-effort.
    async fn put_on_cluster(
        &self,
        hkey: u64,
        name: &str,
        key: &str,
        value: Vec<u8>,
        deadline: i64,
    ) -> Result<(), KvError> {
        let partition_id = self.partitions.partition_id(hkey);
        let dm = self.registry.primary_dmap(partition_id, name).await;
        let timestamp = now_nanos();

        {
            let mut inner = dm.inner.write().await;
            inner.local_put(
                hkey,
                WriteOp {
                    key: key.to_string(),
                    value: value.clone(),
                    timestamp,
                    ttl: deadline,
                },
            )?;
        }

        self.distribute_to_backups(hkey, name, key, value, timestamp, deadline)
            .await;
        Ok(())
    }

    /// Push a freshly accepted write to every backup owner. Failures are
    /// logged; a backup that missed the write is healed later by read
    /// repair.
    async fn distribute_to_backups(
        &self,
        hkey: u64,
        name: &str,
        key: &str,
        value: Vec<u8>,
        timestamp: i64,
        deadline: i64,
    ) {
        if self.config.replica_count < 2 {
            return;
        }
        let backups = self.partitions.backups(hkey);
        let (op, extra) = if deadline == 0 {
            (OpCode::PutReplica, Extra::Put { timestamp })
        } else {
            (
                OpCode::PutExReplica,
                Extra::PutEx {
                    timestamp,
                    ttl: deadline,
                },
            )
        };

        let futs = backups.iter().map(|backup| {
            let req = Request::new(name, key)
                .with_value(value.clone())
                .with_extra(extra.clone());
            async move {
                match self.client.request(backup, op, req).await {
                    Ok(resp) if resp.status == Status::Ok => {}
                    Ok(resp) => tracing::warn!(
                        "backup {} rejected write for {}/{}: {:?}",
                        backup,
                        name,
                        key,
                        resp.status
                    ),
                    Err(e) => {
                        tracing::warn!("failed to write backup {} for {}/{}: {}", backup, name, key, e)
                    }
                }
            }
        });
        futures::future::join_all(futs).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encoded, member, setup, vdata};
    use shardmap_common::hkey;
    use shardmap_protocol::Response;

    fn config(read_quorum: usize, min_replica_count: usize, read_repair: bool) -> KvConfig {
        KvConfig {
            read_quorum,
            replica_count: read_quorum.max(1),
            min_replica_count,
            read_repair,
            max_idle: Duration::ZERO,
        }
    }

    /// Repair is fire-and-forget; give the spawned task a moment.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn repair_rpc_count(calls: &[(Member, OpCode, Request)]) -> usize {
        calls
            .iter()
            .filter(|(_, op, _)| matches!(op, OpCode::PutReplica | OpCode::PutExReplica))
            .count()
    }

    // -----------------------------------------------------------------------
    // GET pipeline
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_node_get() {
        let this = member(7000);
        let (coord, client) = setup(this, vec![this], vec![], config(1, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner.write().await.storage.put(h, vdata("k", b"v", 100, 0));

        assert_eq!(coord.get("users", "k").await.unwrap(), b"v");

        settle().await;
        assert!(
            client.calls().is_empty(),
            "a consistent single node emits no traffic at all"
        );
    }

    #[tokio::test]
    async fn test_stale_local_copy_is_repaired_in_place() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], config(2, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", b"v1", 100, 0));
        client.respond(
            &replica,
            OpCode::GetBackup,
            Response::ok(Some(encoded(&vdata("k", b"v2", 200, 0)))),
        );

        // The replica's newer copy wins.
        assert_eq!(coord.get("users", "k").await.unwrap(), b"v2");

        settle().await;
        // The only stale copy was local: repair re-acquired the write
        // lock after the read returned and applied the winner with its
        // original timestamp. The up-to-date replica got nothing.
        let inner = dm.inner.read().await;
        let data = inner.storage.get(h).unwrap();
        assert_eq!(data.value, b"v2");
        assert_eq!(data.timestamp, 200);
        assert_eq!(repair_rpc_count(&client.calls()), 0);
    }

    #[tokio::test]
    async fn test_stale_replica_receives_repair_write() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], config(2, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", b"v2", 200, 0));
        client.respond(
            &replica,
            OpCode::GetBackup,
            Response::ok(Some(encoded(&vdata("k", b"v1", 100, 0)))),
        );
        client.respond(&replica, OpCode::PutReplica, Response::ok(None));

        assert_eq!(coord.get("users", "k").await.unwrap(), b"v2");

        settle().await;
        let calls = client.calls();
        assert_eq!(repair_rpc_count(&calls), 1);
        let (target, op, req) = calls
            .iter()
            .find(|(_, op, _)| *op == OpCode::PutReplica)
            .unwrap();
        assert_eq!(*target, replica);
        assert_eq!(*op, OpCode::PutReplica);
        assert_eq!(req.value.as_deref(), Some(b"v2".as_slice()));
        assert_eq!(req.extra, Some(Extra::Put { timestamp: 200 }));
    }

    #[tokio::test]
    async fn test_convergence_stops_repair_traffic() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], config(2, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", b"v1", 100, 0));
        client.respond(
            &replica,
            OpCode::GetBackup,
            Response::ok(Some(encoded(&vdata("k", b"v2", 200, 0)))),
        );

        // First read repairs the stale local copy.
        assert_eq!(coord.get("users", "k").await.unwrap(), b"v2");
        settle().await;
        client.clear_calls();

        // Second read sees a consistent cluster: lookups only, no repair.
        assert_eq!(coord.get("users", "k").await.unwrap(), b"v2");
        settle().await;
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, OpCode::GetBackup);
    }

    #[tokio::test]
    async fn test_quorum_shortfall_with_failed_replica() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], config(2, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner.write().await.storage.put(h, vdata("k", b"v", 100, 0));
        client.fail(&replica, OpCode::GetBackup);

        // Two responses collected, but only one carries data.
        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::ReadQuorum), "got {:?}", err);

        // No successful read, no access-log refresh, no repair.
        let inner = dm.inner.read().await;
        assert!(inner.access_log.last_access(h).is_none());
        settle().await;
        assert_eq!(repair_rpc_count(&client.calls()), 0);
    }

    #[tokio::test]
    async fn test_quorum_gate_counts_raw_responses() {
        // Data is present locally, but a quorum of 3 cannot be met with a
        // single response: the gate fires before any winner is considered.
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], config(3, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner.write().await.storage.put(h, vdata("k", b"v", 100, 0));

        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::ReadQuorum));
    }

    #[tokio::test]
    async fn test_unanimous_absence_is_not_found() {
        // Quorum is met and every response is data-less: the key does not
        // exist, which is a different answer than a quorum shortfall.
        let this = member(7000);
        let r1 = member(7001);
        let r2 = member(7002);
        let (coord, client) = setup(this, vec![this], vec![r1, r2], config(3, 2, true));
        client.respond(
            &r1,
            OpCode::GetBackup,
            Response::error(Status::ErrKeyNotFound),
        );
        client.respond(
            &r2,
            OpCode::GetBackup,
            Response::error(Status::ErrKeyNotFound),
        );

        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_expired_winner_is_not_found() {
        let this = member(7000);
        let replica = member(7001);
        // min_replica_count of 1 so the single-response quorum still
        // consults the backup.
        let (coord, client) = setup(this, vec![this], vec![replica], config(1, 1, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", b"v", 100, now_nanos() - 1));
        client.respond(
            &replica,
            OpCode::GetBackup,
            Response::ok(Some(encoded(&vdata("k", b"old", 50, 0)))),
        );

        // The expired copy still wins the ordering; expiry then makes the
        // key indistinguishable from an absent one.
        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound), "got {:?}", err);

        let inner = dm.inner.read().await;
        assert!(inner.access_log.last_access(h).is_none());
        settle().await;
        assert_eq!(repair_rpc_count(&client.calls()), 0);
    }

    #[tokio::test]
    async fn test_tie_break_prefers_larger_value_bytes() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], config(2, 2, false));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", &[0x01], 100, 0));
        client.respond(
            &replica,
            OpCode::GetBackup,
            Response::ok(Some(encoded(&vdata("k", &[0x02], 100, 0)))),
        );

        assert_eq!(coord.get("users", "k").await.unwrap(), vec![0x02]);
    }

    #[tokio::test]
    async fn test_idle_key_is_not_found() {
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], KvConfig {
            max_idle: Duration::from_millis(1),
            ..KvConfig::default()
        });
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        let mut inner = dm.inner.write().await;
        inner.storage.put(h, vdata("k", b"v", 100, 0));
        inner
            .access_log
            .touch(h, now_nanos() - Duration::from_secs(10).as_nanos() as i64);
        drop(inner);

        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound), "got {:?}", err);

        // An idle miss must not refresh the access log.
        let inner = dm.inner.read().await;
        let last = inner.access_log.last_access(h).unwrap();
        assert!(now_nanos() - last >= Duration::from_secs(9).as_nanos() as i64);
    }

    #[tokio::test]
    async fn test_successful_read_refreshes_access_log() {
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], config(1, 2, false));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner.write().await.storage.put(h, vdata("k", b"v", 100, 0));

        coord.get("users", "k").await.unwrap();
        let inner = dm.inner.read().await;
        assert!(inner.access_log.last_access(h).is_some());
    }

    #[tokio::test]
    async fn test_previous_owner_version_can_win() {
        let this = member(7000);
        let prev = member(7001);
        let (coord, client) = setup(this, vec![prev, this], vec![], config(1, 2, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner
            .write()
            .await
            .storage
            .put(h, vdata("k", b"local", 100, 0));
        client.respond(
            &prev,
            OpCode::GetPrev,
            Response::ok(Some(encoded(&vdata("k", b"moved", 300, 0)))),
        );

        assert_eq!(coord.get("users", "k").await.unwrap(), b"moved");

        settle().await;
        // The local copy was stale and gets repaired; the previous owner
        // already holds the winner and is skipped.
        let inner = dm.inner.read().await;
        assert_eq!(inner.storage.get(h).unwrap().timestamp, 300);
        assert_eq!(repair_rpc_count(&client.calls()), 0);
    }

    #[tokio::test]
    async fn test_unreachable_previous_owner_causes_shortfall() {
        // An unreachable previous owner leaves no version behind, unlike
        // an unreachable backup. With a quorum of 2 this read cannot
        // succeed even though local data exists.
        let this = member(7000);
        let dead = member(7001);
        let (coord, client) = setup(this, vec![dead, this], vec![], config(2, 3, true));
        let h = hkey("users", "k");
        let dm = coord.registry.primary_dmap(0, "users").await;
        dm.inner.write().await.storage.put(h, vdata("k", b"v", 100, 0));
        client.fail(&dead, OpCode::GetPrev);

        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::ReadQuorum), "got {:?}", err);
    }

    // -----------------------------------------------------------------------
    // Router
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_forwards_to_partition_owner() {
        let this = member(7000);
        let owner = member(7001);
        let (coord, client) = setup(this, vec![owner], vec![], config(1, 2, true));
        client.respond(&owner, OpCode::Get, Response::ok(Some(b"vv".to_vec())));

        assert_eq!(coord.get("users", "k").await.unwrap(), b"vv");

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, owner);
        assert_eq!(calls[0].1, OpCode::Get);
    }

    #[tokio::test]
    async fn test_forwarded_error_propagates_verbatim() {
        let this = member(7000);
        let owner = member(7001);
        let (coord, client) = setup(this, vec![owner], vec![], config(1, 2, true));
        client.respond(&owner, OpCode::Get, Response::error(Status::ErrReadQuorum));

        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::ReadQuorum));

        client.respond(&owner, OpCode::Get, Response::error(Status::ErrKeyNotFound));
        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound));
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_put_then_get() {
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], config(1, 2, false));

        coord.put("users", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(coord.get("users", "k").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_put_distributes_to_backups() {
        let this = member(7000);
        let backup = member(7001);
        let (coord, client) = setup(
            this,
            vec![this],
            vec![backup],
            KvConfig {
                replica_count: 2,
                ..KvConfig::default()
            },
        );
        client.respond(&backup, OpCode::PutReplica, Response::ok(None));

        coord.put("users", "k", b"v".to_vec()).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, OpCode::PutReplica);
        assert_eq!(calls[0].2.value.as_deref(), Some(b"v".as_slice()));
        assert!(matches!(calls[0].2.extra, Some(Extra::Put { .. })));
    }

    #[tokio::test]
    async fn test_put_ex_expires() {
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], config(1, 2, false));

        coord
            .put_ex("users", "k", b"v".to_vec(), Duration::from_nanos(1))
            .await
            .unwrap();
        let err = coord.get("users", "k").await.unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_put_forwards_to_owner() {
        let this = member(7000);
        let owner = member(7001);
        let (coord, client) = setup(this, vec![owner], vec![], config(1, 2, true));
        client.respond(&owner, OpCode::Put, Response::ok(None));

        coord.put("users", "k", b"v".to_vec()).await.unwrap();
        let calls = client.calls();
        assert_eq!(calls[0].1, OpCode::Put);
    }

}
