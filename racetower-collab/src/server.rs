//! WebSocket relay server for the `update_positions` event.
//!
//! Architecture:
//! ```text
//! Controller ──┐                      ┌── Tower A
//!              ├── BroadcastGroup ────┤
//! Tower C   ───┘        │             └── Tower B
//!                       ▼
//!               LatestPositions
//!            (global + heat, replayed
//!              to late joiners)
//! ```
//!
//! The relay holds no roster. It re-broadcasts every update to every other
//! connected peer and remembers the latest global and heat update so a tower
//! that connects mid-race draws the board immediately.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use racetower_core::{PositionScope, PositionsUpdate};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::broadcast::BroadcastGroup;
use crate::protocol::{MessageType, PeerInfo, PeerRole, SyncMessage};

pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Maximum joined peers
    pub max_peers: usize,
    /// Broadcast channel capacity
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOSTNAME}:{DEFAULT_PORT}"),
            max_peers: 100,
            broadcast_capacity: 256,
        }
    }
}

impl RelayConfig {
    /// Read `HOSTNAME` and `PORT` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// An unparsable `PORT` falls back to the default port.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = lookup("HOSTNAME")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                log::warn!("Ignoring invalid PORT {raw:?}, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };
        Self {
            bind_addr: format!("{hostname}:{port}"),
            ..Self::default()
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub total_bytes: u64,
    pub relayed_updates: u64,
    pub refused_peers: u64,
}

/// Latest encoded update per scope kind.
///
/// Heat updates share one slot: a new current heat replaces the old one.
#[derive(Default)]
struct LatestPositions {
    global: Option<Arc<Vec<u8>>>,
    heat: Option<Arc<Vec<u8>>>,
}

impl LatestPositions {
    fn record(&mut self, scope: PositionScope, encoded: Arc<Vec<u8>>) {
        match scope {
            PositionScope::Global => self.global = Some(encoded),
            PositionScope::Heat { .. } => self.heat = Some(encoded),
        }
    }

    /// Replay order: global first, then heat.
    fn replay(&self) -> Vec<Arc<Vec<u8>>> {
        self.global.iter().chain(self.heat.iter()).cloned().collect()
    }
}

/// Drop a departed peer and tell everyone else it left.
async fn retire_peer(group: &BroadcastGroup, info: &PeerInfo) {
    group.remove_peer(&info.peer_id).await;
    if let Err(e) = group.broadcast(&SyncMessage::leave(info.peer_id)) {
        log::warn!("Failed to announce leave of peer {}: {e}", info.peer_id);
    }
    log::info!("Peer {} ({}) left", info.name, info.peer_id);
}

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    group: Arc<BroadcastGroup>,
    latest: Arc<RwLock<LatestPositions>>,
    stats: Arc<RwLock<RelayStats>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let group = Arc::new(BroadcastGroup::new(config.broadcast_capacity));
        Self {
            config,
            group,
            latest: Arc::new(RwLock::new(LatestPositions::default())),
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Bind the configured address and serve forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay listening on ws://{}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let group = self.group.clone();
            let latest = self.latest.clone();
            let stats = self.stats.clone();
            let max_peers = self.config.max_peers;

            tokio::spawn(async move {
                if let Err(e) =
                    Self::handle_connection(stream, addr, group, latest, stats, max_peers).await
                {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        group: Arc<BroadcastGroup>,
        latest: Arc<RwLock<LatestPositions>>,
        stats: Arc<RwLock<RelayStats>>,
        max_peers: usize,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("Socket connected from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let mut peer: Option<PeerInfo> = None;
        let mut broadcast_rx: Option<tokio::sync::broadcast::Receiver<Arc<Vec<u8>>>> = None;

        let result: Result<(), Box<dyn std::error::Error + Send + Sync>> = async {
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Binary(data))) => {
                                let bytes: Vec<u8> = data.into();
                                let sync_msg = match SyncMessage::decode(&bytes) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        log::warn!("Failed to decode message from {addr}: {e}");
                                        continue;
                                    }
                                };
                                {
                                    let mut s = stats.write().await;
                                    s.total_messages += 1;
                                    s.total_bytes += bytes.len() as u64;
                                }

                                match sync_msg.msg_type {
                                    MessageType::Join => {
                                        if peer.is_some() {
                                            log::debug!("Ignoring repeated join from {addr}");
                                            continue;
                                        }
                                        let info = sync_msg.peer_info().unwrap_or_else(|_| {
                                            PeerInfo::with_id(sync_msg.peer_id, "Anonymous", PeerRole::Viewer)
                                        });

                                        // Subscribe and read the cache under one lock so no
                                        // update slips between replay and live delivery.
                                        let admitted = {
                                            let cache = latest.read().await;
                                            group
                                                .try_add_peer(info.clone(), max_peers)
                                                .await
                                                .map(|rx| (rx, cache.replay()))
                                        };
                                        let Some((rx, replay)) = admitted else {
                                            log::warn!(
                                                "Refusing peer {} from {addr}: relay full ({max_peers} peers)",
                                                info.name
                                            );
                                            stats.write().await.refused_peers += 1;
                                            ws_sender.send(Message::Close(None)).await?;
                                            break;
                                        };
                                        broadcast_rx = Some(rx);

                                        group.broadcast_raw(Arc::new(bytes));
                                        for encoded in replay {
                                            ws_sender.send(Message::Binary(encoded.to_vec().into())).await?;
                                        }

                                        log::info!(
                                            "Peer {} ({}, {:?}) joined from {addr}",
                                            info.name, info.peer_id, info.role
                                        );
                                        peer = Some(info);
                                    }

                                    MessageType::UpdatePositions => {
                                        if peer.is_none() {
                                            log::debug!("Dropping update from {addr} before join");
                                            continue;
                                        }
                                        let update = match sync_msg.positions() {
                                            Ok(u) => u,
                                            Err(e) => {
                                                log::warn!("Dropping malformed positions from {addr}: {e}");
                                                continue;
                                            }
                                        };
                                        let encoded = Arc::new(bytes);
                                        {
                                            let mut cache = latest.write().await;
                                            cache.record(update.scope, encoded.clone());
                                            group.broadcast_raw(encoded);
                                        }
                                        stats.write().await.relayed_updates += 1;
                                        log::debug!(
                                            "Relayed {:?} update with {} entries (seq {})",
                                            update.scope, update.entries.len(), sync_msg.seq
                                        );
                                    }

                                    MessageType::Ping => {
                                        let pid = peer.as_ref().map_or(Uuid::nil(), |p| p.peer_id);
                                        let encoded = SyncMessage::pong(pid).encode()?;
                                        ws_sender.send(Message::Binary(encoded.into())).await?;
                                    }

                                    MessageType::Leave => {
                                        log::debug!("Peer at {addr} announced leave");
                                        break;
                                    }

                                    MessageType::Pong => {}
                                }
                            }

                            Some(Ok(Message::Close(_))) | None => break,

                            Some(Ok(Message::Ping(data))) => {
                                ws_sender.send(Message::Pong(data)).await?;
                            }

                            Some(Err(e)) => {
                                log::error!("WebSocket error from {addr}: {e}");
                                break;
                            }

                            _ => {}
                        }
                    }

                    msg = async {
                        if let Some(ref mut rx) = broadcast_rx {
                            rx.recv().await
                        } else {
                            std::future::pending().await
                        }
                    } => {
                        match msg {
                            Ok(data) => {
                                // Don't echo back to sender
                                if let (Ok(sync_msg), Some(p)) = (SyncMessage::decode(&data), &peer) {
                                    if sync_msg.peer_id == p.peer_id {
                                        continue;
                                    }
                                }
                                ws_sender.send(Message::Binary(data.to_vec().into())).await?;
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                log::warn!("Peer at {addr} lagged by {n} messages");
                                group.record_dropped(n);
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            Ok(())
        }
        .await;

        if let Some(info) = peer {
            retire_peer(&group, &info).await;
        }
        log::info!("Socket disconnected from {addr}");
        stats.write().await.active_connections -= 1;

        result
    }

    /// Get relay statistics.
    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the fan-out group.
    pub fn group(&self) -> &Arc<BroadcastGroup> {
        &self.group
    }

    /// Decode the cached updates that a new peer would receive.
    pub async fn latest_positions(&self) -> Vec<PositionsUpdate> {
        let cache = self.latest.read().await;
        cache
            .replay()
            .iter()
            .filter_map(|bytes| SyncMessage::decode(bytes).ok())
            .filter_map(|msg| msg.positions().ok())
            .collect()
    }
}
