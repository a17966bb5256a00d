//! shardmap-node: entry point for a shardmap cluster node.
//!
//! Loads config, builds the partition table from the static peer list,
//! wires the coordinator and TCP transport, then serves peer requests on
//! the configured listen address.

use shardmap_cluster::PartitionTable;
use shardmap_common::{now_nanos, Member};
use shardmap_kv::coordinator::{KvConfig, KvCoordinator};
use shardmap_kv::registry::DMapRegistry;
use shardmap_net::TcpPeerClient;
use std::sync::Arc;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    shardmap_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = shardmap_config::load_from_file(std::path::Path::new(&config_path))
        .unwrap_or_else(|e| {
            tracing::warn!(
                "failed to load config from {}: {}, using defaults",
                config_path,
                e
            );
            // Minimal default: listen on 127.0.0.1:7000
            shardmap_config::load_from_str("listen: \"127.0.0.1:7000\"\npeers: []\n")
                .expect("hardcoded default config must parse")
        });

    let this = Member::new(config.listen, now_nanos());
    tracing::info!(
        "node {} starting, {} partitions, read quorum {}",
        this,
        config.partition_count,
        config.dmap.read_quorum
    );

    // Static membership: this node plus the configured peers. Every node
    // computes the same placement from the same list.
    let mut members = vec![this];
    for peer in &config.peers {
        match peer.parse() {
            Ok(addr) => members.push(Member::from_addr(addr)),
            Err(e) => tracing::warn!("ignoring unparsable peer address {}: {}", peer, e),
        }
    }

    let partitions = Arc::new(PartitionTable::new(config.partition_count));
    partitions.rebuild(&members, config.dmap.replica_count);

    let registry = Arc::new(DMapRegistry::new(config.partition_count));
    let client = Arc::new(TcpPeerClient::new(Duration::from_millis(
        config.dmap.rpc_timeout_ms,
    )));

    let kv_config = KvConfig {
        read_quorum: config.dmap.read_quorum,
        replica_count: config.dmap.replica_count,
        min_replica_count: config.dmap.min_replica_count,
        read_repair: config.dmap.read_repair,
        max_idle: Duration::from_millis(config.dmap.max_idle_ms),
    };
    let coordinator = Arc::new(KvCoordinator::new(
        this,
        partitions,
        registry.clone(),
        client,
        kv_config,
    ));

    // Expiry janitor: periodically sweep records whose TTL passed, along
    // with their access-log entries.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let mut removed = 0usize;
            for dm in registry.all_dmaps().await {
                let mut inner = dm.inner.write().await;
                let dead = inner.storage.remove_expired(now_nanos());
                for hkey in &dead {
                    inner.access_log.remove(*hkey);
                }
                removed += dead.len();
            }
            if removed > 0 {
                tracing::debug!("janitor removed {} expired records", removed);
            }
        }
    });

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr: std::net::SocketAddr = format!("0.0.0.0:{}", metrics_port)
            .parse()
            .expect("valid metrics address");
        tokio::spawn(async move {
            if let Err(e) = shardmap_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("listening on {}", config.listen);
    shardmap_net::serve(listener, coordinator).await?;
    Ok(())
}
