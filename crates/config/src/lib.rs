//! Configuration schema and loader for shardmap nodes.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's RPC listen address.
    pub listen: SocketAddr,

    /// Addresses of the other cluster members.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Number of fixed partitions the keyspace is divided into.
    #[serde(default = "default_partition_count")]
    pub partition_count: u64,

    /// DMap read/replication settings.
    #[serde(default)]
    pub dmap: DmapConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmapConfig {
    /// Minimum number of responses a read needs before it may succeed.
    #[serde(default = "default_read_quorum")]
    pub read_quorum: usize,

    /// Number of copies kept per partition (primary + backups).
    #[serde(default = "default_replica_count")]
    pub replica_count: usize,

    /// Replicas are consulted on reads only when
    /// `read_quorum >= min_replica_count`.
    #[serde(default = "default_min_replica_count")]
    pub min_replica_count: usize,

    /// Whether to propagate the winning version to stale copies after
    /// a successful read.
    #[serde(default = "default_true")]
    pub read_repair: bool,

    /// Keys untouched for this long are treated as evicted on read.
    /// 0 disables idleness tracking.
    #[serde(default)]
    pub max_idle_ms: u64,

    /// Deadline for a single peer RPC in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

impl Default for DmapConfig {
    fn default() -> Self {
        Self {
            read_quorum: default_read_quorum(),
            replica_count: default_replica_count(),
            min_replica_count: default_min_replica_count(),
            read_repair: true,
            max_idle_ms: 0,
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

// --- Defaults ---

fn default_partition_count() -> u64 {
    271
}
fn default_read_quorum() -> usize {
    1
}
fn default_replica_count() -> usize {
    1
}
fn default_min_replica_count() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_rpc_timeout_ms() -> u64 {
    5000
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_count == 0 {
            return Err(ConfigError::Invalid("partition_count must be > 0".into()));
        }
        if self.dmap.read_quorum == 0 {
            return Err(ConfigError::Invalid("dmap.read_quorum must be >= 1".into()));
        }
        if self.dmap.replica_count == 0 {
            return Err(ConfigError::Invalid("dmap.replica_count must be > 0".into()));
        }
        if self.dmap.read_quorum > self.dmap.replica_count {
            return Err(ConfigError::Invalid(format!(
                "dmap.read_quorum ({}) must be <= dmap.replica_count ({})",
                self.dmap.read_quorum, self.dmap.replica_count
            )));
        }
        Ok(())
    }
}

/// Load a `NodeConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<NodeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: NodeConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a `NodeConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
