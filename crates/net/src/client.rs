//! TCP client implementing `PeerClient`.
//!
//! Maintains one pooled connection per peer address. Requests on the same
//! connection are serialized by a mutex; a transport error or timeout
//! evicts the connection so the next request dials fresh.

use crate::frame;
use shardmap_common::Member;
use shardmap_kv::peer_client::{PeerClient, TransportError};
use shardmap_protocol::{OpCode, Request, RequestFrame, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;

/// A framed-TCP peer transport with a per-address connection cache.
#[derive(Debug)]
pub struct TcpPeerClient {
    connections: Arc<RwLock<HashMap<SocketAddr, Arc<Mutex<TcpStream>>>>>,
    timeout: Duration,
}

impl TcpPeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    async fn connection(&self, addr: SocketAddr) -> Result<Arc<Mutex<TcpStream>>, TransportError> {
        // Check cache first
        {
            let cache = self.connections.read().await;
            if let Some(conn) = cache.get(&addr) {
                return Ok(conn.clone());
            }
        }

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Failed(format!("connect to {} failed: {}", addr, e)))?;
        let conn = Arc::new(Mutex::new(stream));

        let mut cache = self.connections.write().await;
        // Another task may have connected meanwhile; prefer the cached one
        // so both requests share a connection.
        Ok(cache.entry(addr).or_insert(conn).clone())
    }

    async fn evict(&self, addr: SocketAddr) {
        let mut cache = self.connections.write().await;
        cache.remove(&addr);
    }

    async fn exchange(&self, addr: SocketAddr, payload: &[u8]) -> Result<Response, TransportError> {
        let conn = self.connection(addr).await?;
        let mut stream = conn.lock().await;

        frame::write_frame(&mut *stream, payload)
            .await
            .map_err(|e| TransportError::Failed(format!("send to {} failed: {}", addr, e)))?;
        let resp_bytes = frame::read_frame(&mut *stream)
            .await
            .map_err(|e| TransportError::Failed(format!("recv from {} failed: {}", addr, e)))?;

        shardmap_protocol::decode(&resp_bytes)
            .map_err(|e| TransportError::Failed(format!("undecodable response from {}: {}", addr, e)))
    }
}

#[async_trait::async_trait]
impl PeerClient for TcpPeerClient {
    async fn request(
        &self,
        target: &Member,
        op: OpCode,
        req: Request,
    ) -> Result<Response, TransportError> {
        let m = shardmap_metrics::metrics();
        m.rpcs_sent.inc();
        m.rpcs_sent_by_type.with_label_values(&[op.name()]).inc();
        let _timer = shardmap_metrics::start_rpc_timer(op.name(), "outbound");

        let payload = shardmap_protocol::encode(&RequestFrame { op, request: req })
            .map_err(|e| TransportError::Failed(format!("encode failed: {}", e)))?;

        match tokio::time::timeout(self.timeout, self.exchange(target.addr, &payload)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => {
                self.evict(target.addr).await;
                Err(e)
            }
            Err(_) => {
                // The connection may be mid-frame; never reuse it.
                self.evict(target.addr).await;
                Err(TransportError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(addr: SocketAddr) -> Member {
        Member::from_addr(addr)
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let client = TcpPeerClient::new(Duration::from_millis(500));
        // Port 1 on localhost is essentially never listening.
        let target = member("127.0.0.1:1".parse().unwrap());

        let err = client
            .request(&target, OpCode::Get, Request::new("users", "k"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Failed(_)));
    }

    #[tokio::test]
    async fn test_unresponsive_peer_times_out() {
        // A listener that accepts but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let client = TcpPeerClient::new(Duration::from_millis(100));
        let err = client
            .request(&member(addr), OpCode::Get, Request::new("users", "k"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }
}
