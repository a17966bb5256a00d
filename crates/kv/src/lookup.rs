//! Version collection from the owner chain and the backup set.
//!
//! Both lookups run under the DMap read lock held by the caller. They
//! treat failures asymmetrically on purpose: an unreachable previous owner
//! is omitted from the response set (its copy is transient and will be
//! reaped by the rebalancer), while an unreachable backup still yields a
//! data-less version, because the backup set is authoritative and its
//! mere response presence counts toward the quorum.

use crate::coordinator::KvCoordinator;
use crate::dmap::DMapInner;
use crate::peer_client::PeerClient;
use crate::version::Version;
use shardmap_protocol::{OpCode, Request, Status};
use shardmap_storage::VData;

impl<C: PeerClient> KvCoordinator<C> {
    /// Collect versions from the current primary (local) and every
    /// previous partition owner.
    pub(crate) async fn lookup_on_owners(
        &self,
        inner: &DMapInner,
        hkey: u64,
        name: &str,
        key: &str,
    ) -> Vec<Version> {
        let mut versions = Vec::new();

        // Check on localhost, the partition owner. A miss is expected,
        // not an error: the version is recorded as data-less.
        let mut local = Version::absent(self.this);
        match inner.storage.get(hkey) {
            Some(data) => local.data = Some(data.clone()),
            None => tracing::debug!("{}/{} not in local storage", name, key),
        }
        versions.push(local);

        let owners = self.partitions.owners(hkey);
        assert!(!owners.is_empty(), "partition owners list cannot be empty");

        // Query previous owners newest-first, skipping the last entry:
        // that is this node, already answered above.
        for owner in owners[..owners.len() - 1].iter().rev() {
            let resp = self
                .client
                .request(owner, OpCode::GetPrev, Request::new(name, key))
                .await;
            match resp {
                Err(e) => {
                    // Ignore failed previous owners. The data on those
                    // hosts will be wiped out by the rebalancer.
                    tracing::debug!(
                        "failed to call get on a previous primary owner {}: {}",
                        owner,
                        e
                    );
                }
                Ok(resp) if resp.status == Status::Ok => {
                    let payload = resp.value.unwrap_or_default();
                    match shardmap_protocol::decode::<VData>(&payload) {
                        Ok(data) => versions.push(Version::with_data(*owner, data)),
                        Err(e) => tracing::warn!(
                            "failed to decode data from a previous primary owner {}: {}",
                            owner,
                            e
                        ),
                    }
                }
                Ok(resp) => {
                    tracing::debug!(
                        "previous primary owner {} answered {:?} for {}/{}",
                        owner,
                        resp.status,
                        name,
                        key
                    );
                }
            }
        }
        versions
    }

    /// Collect one version per backup owner. Every backup contributes a
    /// version even when it fails, with data only on a decodable hit.
    pub(crate) async fn lookup_on_replicas(
        &self,
        hkey: u64,
        name: &str,
        key: &str,
    ) -> Vec<Version> {
        let backups = self.partitions.backups(hkey);

        let futs = backups.iter().map(|replica| async move {
            let mut ver = Version::absent(*replica);
            let resp = self
                .client
                .request(replica, OpCode::GetBackup, Request::new(name, key))
                .await;
            match resp {
                Err(e) => {
                    tracing::debug!("failed to call get on a replica owner {}: {}", replica, e)
                }
                Ok(resp) if resp.status == Status::Ok => {
                    let payload = resp.value.unwrap_or_default();
                    match shardmap_protocol::decode::<VData>(&payload) {
                        Ok(data) => ver.data = Some(data),
                        Err(e) => tracing::warn!(
                            "failed to decode data from a replica owner {}: {}",
                            replica,
                            e
                        ),
                    }
                }
                Ok(_) => {
                    // Miss or expired on the replica: the response still
                    // counts, the data does not.
                }
            }
            ver
        });
        futures::future::join_all(futs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::KvConfig;
    use crate::testing::{encoded, member, setup, vdata};

    #[tokio::test]
    async fn test_local_miss_produces_dataless_version() {
        let this = member(7000);
        let (coord, _client) = setup(this, vec![this], vec![], KvConfig::default());

        let dm = coord.registry().primary_dmap(0, "users").await;
        let inner = dm.inner.read().await;
        let versions = coord.lookup_on_owners(&inner, 1, "users", "k").await;

        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].host, this);
        assert!(versions[0].data.is_none());
    }

    #[tokio::test]
    async fn test_previous_owner_payload_is_decoded() {
        // Pins that a GET-PREV payload actually populates the version
        // handed to reconciliation.
        let this = member(7000);
        let prev = member(7001);
        let (coord, client) = setup(this, vec![prev, this], vec![], KvConfig::default());

        let data = vdata("k", b"from-prev", 300, 0);
        client.respond(
            &prev,
            OpCode::GetPrev,
            shardmap_protocol::Response::ok(Some(encoded(&data))),
        );

        let dm = coord.registry().primary_dmap(0, "users").await;
        let inner = dm.inner.read().await;
        let versions = coord.lookup_on_owners(&inner, 1, "users", "k").await;

        assert_eq!(versions.len(), 2);
        let prev_ver = &versions[1];
        assert_eq!(prev_ver.host, prev);
        let decoded = prev_ver.data.as_ref().expect("payload must be populated");
        assert_eq!(decoded.value, b"from-prev");
        assert_eq!(decoded.timestamp, 300);
    }

    #[tokio::test]
    async fn test_unreachable_previous_owner_is_omitted() {
        let this = member(7000);
        let dead = member(7001);
        let (coord, client) = setup(this, vec![dead, this], vec![], KvConfig::default());
        client.fail(&dead, OpCode::GetPrev);

        let dm = coord.registry().primary_dmap(0, "users").await;
        let inner = dm.inner.read().await;
        let versions = coord.lookup_on_owners(&inner, 1, "users", "k").await;

        // Only the local version remains; the dead owner left no trace.
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_previous_owner_is_omitted() {
        let this = member(7000);
        let prev = member(7001);
        let (coord, client) = setup(this, vec![prev, this], vec![], KvConfig::default());
        client.respond(
            &prev,
            OpCode::GetPrev,
            shardmap_protocol::Response::ok(Some(vec![0xc1, 0x00])),
        );

        let dm = coord.registry().primary_dmap(0, "users").await;
        let inner = dm.inner.read().await;
        let versions = coord.lookup_on_owners(&inner, 1, "users", "k").await;
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn test_owners_walked_newest_first() {
        let this = member(7000);
        let oldest = member(7001);
        let newer = member(7002);
        let (coord, client) =
            setup(this, vec![oldest, newer, this], vec![], KvConfig::default());
        client.respond(
            &oldest,
            OpCode::GetPrev,
            shardmap_protocol::Response::error(shardmap_protocol::Status::ErrKeyNotFound),
        );
        client.respond(
            &newer,
            OpCode::GetPrev,
            shardmap_protocol::Response::error(shardmap_protocol::Status::ErrKeyNotFound),
        );

        let dm = coord.registry().primary_dmap(0, "users").await;
        let inner = dm.inner.read().await;
        coord.lookup_on_owners(&inner, 1, "users", "k").await;

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, newer, "most recent previous owner first");
        assert_eq!(calls[1].0, oldest);
    }

    #[tokio::test]
    async fn test_unreachable_replica_still_counts_as_response() {
        let this = member(7000);
        let dead = member(7001);
        let alive = member(7002);
        let (coord, client) = setup(this, vec![this], vec![dead, alive], KvConfig::default());
        client.fail(&dead, OpCode::GetBackup);
        client.respond(
            &alive,
            OpCode::GetBackup,
            shardmap_protocol::Response::ok(Some(encoded(&vdata("k", b"v", 100, 0)))),
        );

        let versions = coord.lookup_on_replicas(1, "users", "k").await;

        assert_eq!(versions.len(), 2, "one version per backup, reachable or not");
        assert!(versions.iter().any(|v| v.host == dead && v.data.is_none()));
        assert!(versions.iter().any(|v| v.host == alive && v.data.is_some()));
    }

    #[tokio::test]
    async fn test_replica_miss_yields_dataless_version() {
        let this = member(7000);
        let replica = member(7001);
        let (coord, client) = setup(this, vec![this], vec![replica], KvConfig::default());
        client.respond(
            &replica,
            OpCode::GetBackup,
            shardmap_protocol::Response::error(shardmap_protocol::Status::ErrKeyNotFound),
        );

        let versions = coord.lookup_on_replicas(1, "users", "k").await;
        assert_eq!(versions.len(), 1);
        assert!(versions[0].data.is_none());
    }
}
