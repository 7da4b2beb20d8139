//! Binary protocol for position fan-out.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────┐
//! │ msg_type │ peer_id   │ seq      │ payload  │
//! │ 1 byte   │ 16 bytes  │ varint   │ variable │
//! └──────────┴───────────┴──────────┴──────────┘
//! ```
//!
//! `UpdatePositions` carries a full `PositionsUpdate` for one scope. There is
//! no acknowledgement; every message is a push.

use racetower_core::PositionsUpdate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message types for the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// First message on a connection, payload is `PeerInfo`
    Join = 1,
    /// The `update_positions` event
    UpdatePositions = 2,
    /// Peer left notification
    Leave = 3,
    /// Heartbeat ping
    Ping = 4,
    /// Heartbeat pong
    Pong = 5,
}

/// What a connected peer does with positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerRole {
    /// Owns the roster and publishes updates
    Controller,
    /// Display-only tower
    Viewer,
}

/// Peer identity with display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerInfo {
    pub peer_id: Uuid,
    pub name: String,
    pub role: PeerRole,
}

impl PeerInfo {
    pub fn new(name: impl Into<String>, role: PeerRole) -> Self {
        Self::with_id(Uuid::new_v4(), name, role)
    }

    /// Create with explicit peer_id (for testing)
    pub fn with_id(peer_id: Uuid, name: impl Into<String>, role: PeerRole) -> Self {
        Self {
            peer_id,
            name: name.into(),
            role,
        }
    }

    pub fn controller(name: impl Into<String>) -> Self {
        Self::new(name, PeerRole::Controller)
    }

    pub fn viewer(name: impl Into<String>) -> Self {
        Self::new(name, PeerRole::Viewer)
    }
}

/// Top-level protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessage {
    pub msg_type: MessageType,
    pub peer_id: Uuid,
    /// Per-sender publish counter (diagnostics only)
    pub seq: u64,
    /// Message payload (varies by msg_type)
    pub payload: Vec<u8>,
}

impl SyncMessage {
    /// Create a join message announcing `info`.
    pub fn join(info: &PeerInfo) -> Result<Self, ProtocolError> {
        Ok(Self {
            msg_type: MessageType::Join,
            peer_id: info.peer_id,
            seq: 0,
            payload: encode_payload(info)?,
        })
    }

    /// Create an `update_positions` message.
    pub fn update_positions(
        peer_id: Uuid,
        seq: u64,
        update: &PositionsUpdate,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            msg_type: MessageType::UpdatePositions,
            peer_id,
            seq,
            payload: encode_payload(update)?,
        })
    }

    /// Create a peer left notification.
    pub fn leave(peer_id: Uuid) -> Self {
        Self {
            msg_type: MessageType::Leave,
            peer_id,
            seq: 0,
            payload: Vec::new(),
        }
    }

    /// Create a ping message.
    pub fn ping(peer_id: Uuid) -> Self {
        Self {
            msg_type: MessageType::Ping,
            peer_id,
            seq: 0,
            payload: Vec::new(),
        }
    }

    /// Create a pong message.
    pub fn pong(peer_id: Uuid) -> Self {
        Self {
            msg_type: MessageType::Pong,
            peer_id,
            seq: 0,
            payload: Vec::new(),
        }
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }

    /// Parse the positions payload.
    pub fn positions(&self) -> Result<PositionsUpdate, ProtocolError> {
        if self.msg_type != MessageType::UpdatePositions {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }

    /// Parse the peer info payload.
    pub fn peer_info(&self) -> Result<PeerInfo, ProtocolError> {
        if self.msg_type != MessageType::Join {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::SerializationError(e.to_string()))
}

fn decode_payload<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    Ok(value)
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    InvalidMessageType,
    ConnectionClosed,
    Timeout,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidMessageType => write!(f, "Invalid message type"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl std::error::Error for ProtocolError {}
