//! Wire protocol for peer-to-peer requests.
//!
//! Every cluster-internal message is a msgpack-encoded envelope inside a
//! u32 length-prefixed frame. Opcode values are part of the wire contract
//! and must never be renumbered.

use serde::{Deserialize, Serialize};

/// Maximum accepted frame length. Anything larger is a protocol violation.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Peer operation codes. Wire values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OpCode {
    /// Cluster-wide GET, served by the partition owner.
    Get,
    /// Best-effort GET against a previous partition owner.
    GetPrev,
    /// GET against a backup owner.
    GetBackup,
    /// Replica write without expiry, carrying the original timestamp.
    PutReplica,
    /// Replica write with expiry, carrying the original timestamp and TTL.
    PutExReplica,
    /// Client write without expiry, routed to the partition owner.
    Put,
    /// Client write with expiry, routed to the partition owner.
    PutEx,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        match op {
            OpCode::Get => 1,
            OpCode::GetPrev => 2,
            OpCode::GetBackup => 3,
            OpCode::PutReplica => 4,
            OpCode::PutExReplica => 5,
            OpCode::Put => 6,
            OpCode::PutEx => 7,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpCode::Get),
            2 => Ok(OpCode::GetPrev),
            3 => Ok(OpCode::GetBackup),
            4 => Ok(OpCode::PutReplica),
            5 => Ok(OpCode::PutExReplica),
            6 => Ok(OpCode::Put),
            7 => Ok(OpCode::PutEx),
            other => Err(format!("unknown opcode: {}", other)),
        }
    }
}

impl OpCode {
    /// Label used for per-RPC metrics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Get => "get",
            OpCode::GetPrev => "get_prev",
            OpCode::GetBackup => "get_backup",
            OpCode::PutReplica => "put_replica",
            OpCode::PutExReplica => "put_ex_replica",
            OpCode::Put => "put",
            OpCode::PutEx => "put_ex",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Opcode-specific request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extra {
    /// PUT-REPLICA: the winner's original write timestamp.
    Put { timestamp: i64 },
    /// PUT-EX-REPLICA: original timestamp plus absolute TTL.
    PutEx { timestamp: i64, ttl: i64 },
}

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub dmap: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
    #[serde(default)]
    pub extra: Option<Extra>,
}

impl Request {
    pub fn new(dmap: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            dmap: dmap.into(),
            key: key.into(),
            value: None,
            extra: None,
        }
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Response status. Wire values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    Ok,
    ErrKeyNotFound,
    ErrReadQuorum,
    ErrInternal,
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        match status {
            Status::Ok => 0,
            Status::ErrKeyNotFound => 1,
            Status::ErrReadQuorum => 2,
            Status::ErrInternal => 3,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Ok),
            1 => Ok(Status::ErrKeyNotFound),
            2 => Ok(Status::ErrReadQuorum),
            3 => Ok(Status::ErrInternal),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

impl Response {
    pub fn ok(value: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            value,
        }
    }

    pub fn error(status: Status) -> Self {
        Self {
            status,
            value: None,
        }
    }
}

/// A request together with its opcode, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub op: OpCode,
    pub request: Request,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encode a message with the cluster-internal msgpack codec.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

/// Decode a message encoded by [`encode`].
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
