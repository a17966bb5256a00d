//! Read repair: push the winning version to every stale copy.

use crate::coordinator::KvCoordinator;
use crate::dmap::{DMap, WriteOp};
use crate::peer_client::PeerClient;
use crate::version::Version;
use shardmap_common::Member;
use shardmap_protocol::{Extra, OpCode, Request, Status};
use std::sync::Arc;

impl<C: PeerClient> KvCoordinator<C> {
    /// Spawn a background task that repairs stale copies with the winner.
    ///
    /// Fire-and-forget: the client reply has already been prepared, and a
    /// repair that outlives the request keeps running to completion.
    pub(crate) fn spawn_read_repair(
        &self,
        name: &str,
        dm: Arc<DMap>,
        hkey: u64,
        winner: Version,
        versions: Vec<Version>,
    ) {
        let client = self.client.clone();
        let this = self.this;
        let name = name.to_string();
        tokio::spawn(async move {
            shardmap_metrics::metrics().read_repairs.inc();
            read_repair(&*client, this, &name, &dm, hkey, &winner, &versions).await;
        });
    }
}

/// Repair every version in the collected set that does not already carry
/// the winner's timestamp. Failures are logged and swallowed: repair never
/// affects the client reply.
pub(crate) async fn read_repair<C: PeerClient>(
    client: &C,
    this: Member,
    name: &str,
    dm: &DMap,
    hkey: u64,
    winner: &Version,
    versions: &[Version],
) {
    let Some(win) = &winner.data else { return };

    for ver in versions {
        if let Some(data) = &ver.data {
            if data.timestamp == win.timestamp {
                continue;
            }
        }

        if ver.host == this {
            // Local repair re-enters the DMap for the write lock, which
            // is why the caller released the read lock first.
            let op = WriteOp {
                key: win.key.clone(),
                value: win.value.clone(),
                timestamp: win.timestamp,
                ttl: win.ttl,
            };
            let mut inner = dm.inner.write().await;
            match inner.local_put(hkey, op) {
                Ok(()) => shardmap_metrics::metrics().read_repair_writes.inc(),
                Err(e) => {
                    tracing::warn!("failed to synchronize local copy of {}/{}: {}", name, win.key, e)
                }
            }
        } else {
            let (op, extra) = if win.ttl == 0 {
                (
                    OpCode::PutReplica,
                    Extra::Put {
                        timestamp: win.timestamp,
                    },
                )
            } else {
                (
                    OpCode::PutExReplica,
                    Extra::PutEx {
                        timestamp: win.timestamp,
                        ttl: win.ttl,
                    },
                )
            };
            let req = Request::new(name, win.key.clone())
                .with_value(win.value.clone())
                .with_extra(extra);
            match client.request(&ver.host, op, req).await {
                Ok(resp) if resp.status == Status::Ok => {
                    shardmap_metrics::metrics().read_repair_writes.inc()
                }
                Ok(resp) => tracing::warn!(
                    "replica {} rejected repair write for {}/{}: {:?}",
                    ver.host,
                    name,
                    win.key,
                    resp.status
                ),
                Err(e) => tracing::warn!("failed to synchronize replica {}: {}", ver.host, e),
            }
        }
    }
}
