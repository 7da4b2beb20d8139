//! # racetower-collab: Live position fan-out for race towers
//!
//! Carries `update_positions` events from the controlling session to every
//! connected tower, and persists roster snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    WebSocket     ┌──────────────┐
//! │ Session          │ ◄──────────────► │ RelayServer  │
//! │ + ClientPublisher│   Binary Proto   │ (central)    │
//! └────────┬─────────┘                  └──────┬───────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌──────────────────┐              ┌────────────────┐
//! │ RocksSnapshot    │              │ BroadcastGroup │──► towers
//! │ Store            │              │ (fan-out)      │
//! └──────────────────┘              └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Binary wire protocol (bincode-encoded SyncMessage)
//! - [`broadcast`]: In-process fan-out with backpressure
//! - [`server`]: WebSocket relay server
//! - [`client`]: WebSocket client and non-blocking publisher
//! - [`storage`]: RocksDB snapshot store

pub mod protocol;
pub mod broadcast;
pub mod server;
pub mod client;
pub mod storage;

// Re-exports for convenience
pub use protocol::{MessageType, PeerInfo, PeerRole, ProtocolError, SyncMessage};
pub use broadcast::{BroadcastGroup, BroadcastStats, Subscription};
pub use server::{RelayConfig, RelayServer, RelayStats};
pub use client::{ClientPublisher, ConnectionState, SyncClient, SyncEvent};
pub use storage::{RocksSnapshotStore, SnapshotMetadata, StoreConfig, StoreError};
