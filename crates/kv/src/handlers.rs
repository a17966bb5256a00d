//! Peer-side RPC handlers.
//!
//! Bridges decoded request envelopes to the coordinator. Every handler
//! returns a response envelope; errors a peer can act on become distinct
//! statuses so the caller can drop the version from its quorum pool.

use crate::coordinator::{KvCoordinator, KvError};
use crate::dmap::WriteOp;
use crate::peer_client::PeerClient;
use shardmap_common::{hkey, now_nanos};
use shardmap_protocol::{Extra, OpCode, Request, Response, Status};
use shardmap_storage::is_expired;

/// Map a pipeline error onto a response status.
fn error_response(err: KvError) -> Response {
    match err {
        KvError::KeyNotFound => Response::error(Status::ErrKeyNotFound),
        KvError::ReadQuorum => Response::error(Status::ErrReadQuorum),
        other => {
            tracing::warn!("request failed: {}", other);
            Response::error(Status::ErrInternal)
        }
    }
}

impl<C: PeerClient> KvCoordinator<C> {
    /// Serve one decoded peer request.
    pub async fn dispatch(&self, op: OpCode, req: Request) -> Response {
        let m = shardmap_metrics::metrics();
        m.rpcs_received.inc();
        m.rpcs_received_by_type.with_label_values(&[op.name()]).inc();
        let _timer = shardmap_metrics::start_rpc_timer(op.name(), "inbound");

        match op {
            OpCode::Get => self.handle_get(req).await,
            OpCode::GetPrev => self.handle_get_prev(req).await,
            OpCode::GetBackup => self.handle_get_backup(req).await,
            OpCode::PutReplica | OpCode::PutExReplica => self.handle_put_replica(op, req).await,
            OpCode::Put | OpCode::PutEx => self.handle_put(op, req).await,
        }
    }

    /// GET on behalf of a peer: the full pipeline, including forwarding
    /// if ownership moved again since the peer routed here.
    async fn handle_get(&self, req: Request) -> Response {
        match self.get(&req.dmap, &req.key).await {
            Ok(value) => Response::ok(Some(value)),
            Err(e) => error_response(e),
        }
    }

    /// GET-PREV: serve whatever this node still holds as a former primary.
    ///
    /// The DMap is looked up without creating it; a node that never held
    /// the dmap answers not-found. This is a best-effort snapshot of a
    /// partition this node no longer primarily owns, so the read guard is
    /// held only long enough to copy the record out.
    async fn handle_get_prev(&self, req: Request) -> Response {
        let hkey = hkey(&req.dmap, &req.key);
        let partition_id = self.partitions.partition_id(hkey);
        let Some(dm) = self.registry.get_primary(partition_id, &req.dmap).await else {
            return Response::error(Status::ErrKeyNotFound);
        };

        let inner = dm.inner.read().await;
        let Some(data) = inner.storage.get(hkey) else {
            return Response::error(Status::ErrKeyNotFound);
        };
        if is_expired(data.ttl, now_nanos()) {
            return Response::error(Status::ErrKeyNotFound);
        }
        match shardmap_protocol::encode(data) {
            Ok(payload) => Response::ok(Some(payload)),
            Err(e) => {
                tracing::warn!("failed to encode version payload: {}", e);
                Response::error(Status::ErrInternal)
            }
        }
    }

    /// GET-BACKUP: serve this node's backup copy under a read lock.
    async fn handle_get_backup(&self, req: Request) -> Response {
        let hkey = hkey(&req.dmap, &req.key);
        let partition_id = self.partitions.partition_id(hkey);
        let Some(dm) = self.registry.get_backup(partition_id, &req.dmap).await else {
            return Response::error(Status::ErrKeyNotFound);
        };

        let inner = dm.inner.read().await;
        let Some(data) = inner.storage.get(hkey) else {
            return Response::error(Status::ErrKeyNotFound);
        };
        if is_expired(data.ttl, now_nanos()) {
            return Response::error(Status::ErrKeyNotFound);
        }
        match shardmap_protocol::encode(data) {
            Ok(payload) => Response::ok(Some(payload)),
            Err(e) => {
                tracing::warn!("failed to encode version payload: {}", e);
                Response::error(Status::ErrInternal)
            }
        }
    }

    /// PUT-REPLICA / PUT-EX-REPLICA: apply a replica write into the backup
    /// table. The write must advance the stored timestamp; anything else
    /// is rejected so late repair traffic cannot clobber a newer write.
    async fn handle_put_replica(&self, op: OpCode, req: Request) -> Response {
        let (timestamp, ttl) = match (op, &req.extra) {
            (OpCode::PutReplica, Some(Extra::Put { timestamp })) => (*timestamp, 0),
            (OpCode::PutExReplica, Some(Extra::PutEx { timestamp, ttl })) => (*timestamp, *ttl),
            _ => {
                tracing::warn!("replica write without a usable extra: {:?}", op);
                return Response::error(Status::ErrInternal);
            }
        };
        let Some(value) = req.value else {
            tracing::warn!("replica write without a value");
            return Response::error(Status::ErrInternal);
        };

        let hkey = hkey(&req.dmap, &req.key);
        let partition_id = self.partitions.partition_id(hkey);
        let dm = self.registry.backup_dmap(partition_id, &req.dmap).await;

        let mut inner = dm.inner.write().await;
        match inner.local_put(
            hkey,
            WriteOp {
                key: req.key,
                value,
                timestamp,
                ttl,
            },
        ) {
            Ok(()) => Response::ok(None),
            Err(e) => {
                tracing::debug!("rejected replica write for {}: {}", req.dmap, e);
                Response::error(Status::ErrInternal)
            }
        }
    }

    /// PUT / PUT-EX forwarded from another node: route through the write
    /// path as if the client had connected here.
    async fn handle_put(&self, op: OpCode, req: Request) -> Response {
        let deadline = match (op, &req.extra) {
            (OpCode::Put, _) => 0,
            (OpCode::PutEx, Some(Extra::PutEx { ttl, .. })) => *ttl,
            _ => {
                tracing::warn!("PUT-EX without a TTL extra");
                return Response::error(Status::ErrInternal);
            }
        };
        let Some(value) = req.value else {
            tracing::warn!("put without a value");
            return Response::error(Status::ErrInternal);
        };

        match self
            .put_with_deadline(&req.dmap, &req.key, value, deadline)
            .await
        {
            Ok(()) => Response::ok(None),
            Err(e) => error_response(e),
        }
    }
}
