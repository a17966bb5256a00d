//! TCP transport for shardmap.
//!
//! Implements the `PeerClient` trait from `shardmap-kv` over length-prefixed
//! msgpack frames, plus the server side that feeds inbound frames to the
//! coordinator's handlers.

pub mod client;
pub mod frame;
pub mod server;

pub use client::TcpPeerClient;
pub use server::serve;
