//! Abstraction over peer-to-peer RPCs.
//!
//! Concrete implementation lives in `shardmap-net`.

use shardmap_common::Member;
use shardmap_protocol::{OpCode, Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("RPC failed: {0}")]
    Failed(String),
    #[error("timeout")]
    Timeout,
}

/// Transport for peer RPCs.
///
/// A trait in the domain crate with the TCP implementation in the `net`
/// crate, so the read path can be exercised against mocks. A timeout is a
/// transport error like any other; callers never distinguish the two.
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync + 'static {
    /// Send a request to a peer and await its response envelope.
    async fn request(
        &self,
        target: &Member,
        op: OpCode,
        req: Request,
    ) -> Result<Response, TransportError>;
}
