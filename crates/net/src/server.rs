//! TCP server: accepts peer connections and bridges decoded request
//! frames to the coordinator's handlers.

use crate::frame;
use shardmap_kv::coordinator::KvCoordinator;
use shardmap_kv::peer_client::PeerClient;
use shardmap_protocol::{RequestFrame, Response, Status};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Serve peer requests on an already-bound listener. Runs until the
/// listener fails; each connection gets its own task.
pub async fn serve<C: PeerClient>(
    listener: TcpListener,
    coordinator: Arc<KvCoordinator<C>>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, coordinator).await {
                tracing::debug!("connection from {} closed: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_connection<C: PeerClient>(
    mut stream: TcpStream,
    coordinator: Arc<KvCoordinator<C>>,
) -> std::io::Result<()> {
    loop {
        let raw = match frame::read_frame(&mut stream).await {
            Ok(raw) => raw,
            // Peer hung up between requests.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        let resp = match shardmap_protocol::decode::<RequestFrame>(&raw) {
            Ok(frame) => coordinator.dispatch(frame.op, frame.request).await,
            Err(e) => {
                tracing::warn!("undecodable request frame: {}", e);
                Response::error(Status::ErrInternal)
            }
        };

        let payload = shardmap_protocol::encode(&resp)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        frame::write_frame(&mut stream, &payload).await?;
    }
}
