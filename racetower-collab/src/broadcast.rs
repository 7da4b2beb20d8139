//! Fan-out broadcast to N peers with backpressure.
//!
//! Uses a tokio broadcast channel for O(1) send to all subscribers.
//! Each subscriber gets an independent receiver that buffers up to `capacity`
//! messages; a receiver that falls further behind skips the oldest ones, so a
//! slow viewer never stalls the publisher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use racetower_core::{PositionPublisher, PositionsUpdate, PublishError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::{MessageType, PeerInfo, SyncMessage};

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub active_peers: usize,
}

/// Atomic broadcast stats, lock-free on the hot path.
struct AtomicBroadcastStats {
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

impl AtomicBroadcastStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }
}

/// A broadcast group shared by every peer of one roster.
pub struct BroadcastGroup {
    /// Broadcast channel sender
    sender: broadcast::Sender<Arc<Vec<u8>>>,

    /// Connected peers
    peers: Arc<RwLock<HashMap<Uuid, PeerInfo>>>,

    /// Channel capacity (messages buffered per receiver)
    capacity: usize,

    /// Lock-free stats (atomics)
    atomic_stats: Arc<AtomicBroadcastStats>,

    /// Sequence number for updates published in-process
    publish_seq: AtomicU64,
}

impl BroadcastGroup {
    /// Create a new broadcast group with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            peers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            atomic_stats: Arc::new(AtomicBroadcastStats::new()),
            publish_seq: AtomicU64::new(0),
        }
    }

    /// Add a peer and return its receiver.
    pub async fn add_peer(&self, info: PeerInfo) -> broadcast::Receiver<Arc<Vec<u8>>> {
        let mut peers = self.peers.write().await;
        peers.insert(info.peer_id, info);
        self.sender.subscribe()
    }

    /// Add a peer unless the group already holds `max_peers`.
    ///
    /// The limit check and the insert happen under one write lock, so
    /// concurrent joins can never push the group past the limit.
    pub async fn try_add_peer(
        &self,
        info: PeerInfo,
        max_peers: usize,
    ) -> Option<broadcast::Receiver<Arc<Vec<u8>>>> {
        let mut peers = self.peers.write().await;
        if peers.len() >= max_peers {
            return None;
        }
        peers.insert(info.peer_id, info);
        Some(self.sender.subscribe())
    }

    /// Remove a peer from this broadcast group.
    pub async fn remove_peer(&self, peer_id: &Uuid) -> Option<PeerInfo> {
        let mut peers = self.peers.write().await;
        peers.remove(peer_id)
    }

    /// Broadcast a message to every receiver.
    ///
    /// Filtering out the sender is the receiver's job.
    /// Returns the number of receivers that got the message.
    pub fn broadcast(&self, msg: &SyncMessage) -> Result<usize, crate::protocol::ProtocolError> {
        let encoded = msg.encode()?;
        Ok(self.broadcast_raw(Arc::new(encoded)))
    }

    /// Broadcast pre-encoded bytes directly (zero-copy fast path).
    pub fn broadcast_raw(&self, encoded: Arc<Vec<u8>>) -> usize {
        let count = self.sender.send(encoded).unwrap_or(0);
        self.atomic_stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Record messages a lagging receiver skipped.
    pub fn record_dropped(&self, count: u64) {
        self.atomic_stats.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current peer count.
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Get all connected peer infos.
    pub async fn peers(&self) -> Vec<PeerInfo> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Check if a peer is connected.
    pub async fn has_peer(&self, peer_id: &Uuid) -> bool {
        self.peers.read().await.contains_key(peer_id)
    }

    /// Get broadcast statistics.
    pub async fn stats(&self) -> BroadcastStats {
        let peers = self.peers.read().await;
        BroadcastStats {
            messages_sent: self.atomic_stats.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.atomic_stats.messages_dropped.load(Ordering::Relaxed),
            active_peers: peers.len(),
        }
    }

    /// Get the channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to this broadcast group (raw receiver).
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.sender.subscribe()
    }

    /// Run `handler` for every positions update published from now on.
    ///
    /// Must be called from within a tokio runtime. The handler stops when the
    /// returned `Subscription` is dropped.
    pub fn subscribe_positions<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(PositionsUpdate) + Send + 'static,
    {
        let mut rx = self.sender.subscribe();
        let stats = self.atomic_stats.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(bytes) => {
                        let Ok(msg) = SyncMessage::decode(&bytes) else {
                            continue;
                        };
                        if msg.msg_type != MessageType::UpdatePositions {
                            continue;
                        }
                        match msg.positions() {
                            Ok(update) => handler(update),
                            Err(e) => log::warn!("Dropping undecodable positions: {e}"),
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("Positions subscriber lagged by {n} messages");
                        stats.messages_dropped.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription { handle }
    }
}

/// In-process publish: encode once, fan out, never wait on receivers.
impl PositionPublisher for BroadcastGroup {
    fn publish(&self, update: &PositionsUpdate) -> Result<(), PublishError> {
        let seq = self.publish_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = SyncMessage::update_positions(Uuid::nil(), seq, update)
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        self.broadcast(&msg)
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        Ok(())
    }
}

/// Handle for a running subscription; dropping it stops delivery.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
