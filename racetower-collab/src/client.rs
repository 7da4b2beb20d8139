//! WebSocket sync client for connecting to the relay.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect)
//! - Receiving `update_positions` events as [`SyncEvent::Positions`]
//! - A non-blocking [`ClientPublisher`] a controller session publishes through

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use racetower_core::{PositionPublisher, PositionsUpdate, PublishError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::protocol::{MessageType, PeerInfo, ProtocolError, SyncMessage};

/// Outgoing queue depth per connection.
pub const OUTGOING_CAPACITY: usize = 256;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the sync client.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connection established
    Connected,
    /// Connection lost
    Disconnected,
    /// Positions pushed by another peer (or replayed on join)
    Positions(PositionsUpdate),
    /// A peer joined the relay
    PeerJoined(PeerInfo),
    /// A peer left the relay
    PeerLeft(Uuid),
}

/// The sync client.
pub struct SyncClient {
    /// Our peer identity
    peer_info: PeerInfo,

    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Mirrors `state == Connected` for synchronous publishers
    online: Arc<AtomicBool>,

    /// Publish counter shared with every publisher
    seq: Arc<AtomicU64>,

    /// Channel to send messages to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<SyncEvent>>,

    /// Event sender (held by connection task)
    event_tx: mpsc::Sender<SyncEvent>,

    /// Server URL
    server_url: String,
}

impl SyncClient {
    /// Create a new sync client.
    pub fn new(peer_info: PeerInfo, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            peer_info,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            online: Arc::new(AtomicBool::new(false)),
            seq: Arc::new(AtomicU64::new(0)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Connect to the relay and announce ourselves.
    ///
    /// Spawns background tasks for reading/writing WebSocket messages.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::warn!("Failed to connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket, close when drained
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTGOING_CAPACITY);
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if ws_writer.send(Message::Binary(data.into())).await.is_err() {
                    return;
                }
            }
            let _ = ws_writer.send(Message::Close(None)).await;
        });

        let join = SyncMessage::join(&self.peer_info)?.encode()?;
        out_tx
            .send(join)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        self.outgoing_tx = Some(out_tx);

        *self.state.write().await = ConnectionState::Connected;
        self.online.store(true, Ordering::Release);
        let _ = self.event_tx.send(SyncEvent::Connected).await;
        log::info!("Connected to {} as {}", self.server_url, self.peer_info.name);

        // Reader task: process incoming WebSocket messages
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        let online = self.online.clone();
        let peer_id = self.peer_info.peer_id;
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        let Ok(sync_msg) = SyncMessage::decode(&bytes) else {
                            continue;
                        };
                        // Skip our own messages
                        if sync_msg.peer_id == peer_id {
                            continue;
                        }

                        let event = match sync_msg.msg_type {
                            MessageType::UpdatePositions => match sync_msg.positions() {
                                Ok(update) => Some(SyncEvent::Positions(update)),
                                Err(e) => {
                                    log::warn!("Dropping malformed positions: {e}");
                                    None
                                }
                            },
                            MessageType::Join => {
                                sync_msg.peer_info().ok().map(SyncEvent::PeerJoined)
                            }
                            MessageType::Leave => Some(SyncEvent::PeerLeft(sync_msg.peer_id)),
                            _ => None,
                        };

                        if let Some(evt) = event {
                            let _ = event_tx.send(evt).await;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            // Connection lost
            online.store(false, Ordering::Release);
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SyncEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Announce leave and close the connection.
    pub async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.online.store(false, Ordering::Release);
        if let Some(tx) = self.outgoing_tx.take() {
            let leave = SyncMessage::leave(self.peer_info.peer_id).encode()?;
            let _ = tx.send(leave).await;
        }
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    /// A publisher bound to this connection.
    ///
    /// Fails if the client has never connected.
    pub fn publisher(&self) -> Result<ClientPublisher, ProtocolError> {
        let outgoing = self
            .outgoing_tx
            .clone()
            .ok_or(ProtocolError::ConnectionClosed)?;
        Ok(ClientPublisher {
            peer_id: self.peer_info.peer_id,
            outgoing,
            online: self.online.clone(),
            seq: self.seq.clone(),
        })
    }

    /// Send positions, waiting for queue space.
    pub async fn send_positions(&self, update: &PositionsUpdate) -> Result<(), ProtocolError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let encoded = SyncMessage::update_positions(self.peer_info.peer_id, seq, update)?.encode()?;
        self.send(encoded).await
    }

    /// Send a ping to the server.
    pub async fn send_ping(&self) -> Result<(), ProtocolError> {
        let encoded = SyncMessage::ping(self.peer_info.peer_id).encode()?;
        self.send(encoded).await
    }

    async fn send(&self, encoded: Vec<u8>) -> Result<(), ProtocolError> {
        if !self.online.load(Ordering::Acquire) {
            return Err(ProtocolError::ConnectionClosed);
        }
        match self.outgoing_tx {
            Some(ref tx) => tx
                .send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get our peer info.
    pub fn peer_info(&self) -> &PeerInfo {
        &self.peer_info
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Number of updates sent so far.
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}

/// Pushes updates onto a client's outgoing queue without waiting.
///
/// A full queue drops the update with [`PublishError::QueueFull`]; the next
/// full snapshot supersedes it.
#[derive(Clone)]
pub struct ClientPublisher {
    peer_id: Uuid,
    outgoing: mpsc::Sender<Vec<u8>>,
    online: Arc<AtomicBool>,
    seq: Arc<AtomicU64>,
}

impl ClientPublisher {
    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }
}

impl PositionPublisher for ClientPublisher {
    fn publish(&self, update: &PositionsUpdate) -> Result<(), PublishError> {
        if !self.online.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let encoded = SyncMessage::update_positions(self.peer_id, seq, update)
            .and_then(|msg| msg.encode())
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        self.outgoing.try_send(encoded).map_err(|e| match e {
            TrySendError::Full(_) => {
                log::warn!("Outgoing queue full, dropping {:?} update", update.scope);
                PublishError::QueueFull
            }
            TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}
