//! ## Heartbeats and peer discovery over UDP broadcast
//!
//! Every node broadcasts `"<KEY_STR>:<id>"` on the base port every
//! [`config::HEARTBEAT_INTERVAL`]. The peer listener collects those heartbeats into a sorted peer
//! list, reports a [`PeerUpdate`] whenever the list changes, and publishes each peer's IP
//! address so envelopes can be sent straight to it.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use anyhow::Context;
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

use crate::config::{self, ElevConfig};
use crate::print;
use crate::world_view::NodeId;

/// Change in the set of live peers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerUpdate {
    /// Every live peer, sorted.
    pub peers: Vec<String>,
    /// Peer that just appeared, if any.
    pub new: Option<String>,
    /// Peers that just timed out, sorted.
    pub lost: Vec<String>,
}

/// Learned IP address of every peer heard from.
pub type PeerAddrs = HashMap<NodeId, IpAddr>;

/// Heartbeat payload for node `id`.
pub fn heartbeat_payload(id: NodeId) -> String {
    format!("{}:{}", config::KEY_STR, id)
}

/// Extracts the peer ID from a heartbeat. Foreign traffic yields `None`.
pub fn parse_heartbeat(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let (key, id) = text.split_once(':')?;
    if key != config::KEY_STR || id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Sets up a reusable broadcast-capable UDP socket bound to `port`.
pub fn broadcast_socket(port: u16) -> std::io::Result<UdpSocket> {
    let addr: SocketAddr = format!("{}:{}", config::BC_LISTEN_ADDR, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;

    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Tracks when each peer was last heard from.
#[derive(Debug, Default)]
pub struct PeerTracker {
    last_seen: HashMap<String, Instant>,
}

impl PeerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a heartbeat from `id`. Returns `true` if `id` was not already live.
    pub fn heard(&mut self, id: &str, now: Instant) -> bool {
        self.last_seen.insert(id.to_string(), now).is_none()
    }

    /// Drops peers silent for longer than `timeout`, returning them sorted.
    pub fn expire(&mut self, now: Instant, timeout: time::Duration) -> Vec<String> {
        let mut lost: Vec<String> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &lost {
            self.last_seen.remove(id);
        }
        lost.sort();
        lost
    }

    /// Live peers, sorted.
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.last_seen.keys().cloned().collect();
        peers.sort();
        peers
    }
}

/// Broadcasts this node's heartbeat forever.
///
/// ## Note
/// This function is permanently blocking, and should be called asynchronously
pub async fn start_heartbeat(config: ElevConfig) -> anyhow::Result<()> {
    let socket = broadcast_socket(0).context("binding heartbeat socket")?;
    let target: SocketAddr = format!("{}:{}", config::BC_ADDR, config.broadcast_port).parse()?;
    let payload = heartbeat_payload(config.node_id);
    let mut interval = time::interval(config::HEARTBEAT_INTERVAL);

    loop {
        interval.tick().await;
        if let Err(e) = socket.send_to(payload.as_bytes(), target).await {
            print::warn(format!("Heartbeat failed: {}", e));
        }
    }
}

/// Listens for heartbeats and reports peer list changes on `peer_tx`.
///
/// ## Behaviour
/// - Reads with a short timeout so silent peers expire even when nobody is talking.
/// - Sends a [`PeerUpdate`] only when a peer appears or is lost.
/// - Publishes the source IP of every heartbeat on `addr_tx`.
///
/// ## Note
/// This function is permanently blocking, and should be called asynchronously
pub async fn start_peer_listener(
    config: ElevConfig,
    peer_tx: mpsc::Sender<PeerUpdate>,
    addr_tx: watch::Sender<PeerAddrs>,
) -> anyhow::Result<()> {
    let socket = broadcast_socket(config.broadcast_port).context("binding peer listener socket")?;
    let mut buf = vec![0u8; config::UDP_BUFFER];
    let mut tracker = PeerTracker::new();

    loop {
        let mut new = None;
        match time::timeout(config::HEARTBEAT_INTERVAL, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                if let Some(id) = parse_heartbeat(&buf[..len]) {
                    if tracker.heard(&id, Instant::now()) {
                        new = Some(id.clone());
                    }
                    if let Ok(node) = id.parse::<NodeId>() {
                        addr_tx.send_if_modified(|addrs| addrs.insert(node, from.ip()) != Some(from.ip()));
                    }
                }
            }
            Ok(Err(e)) => print::warn(format!("Peer listener failed to receive: {}", e)),
            Err(_) => {}
        }

        let lost = tracker.expire(Instant::now(), config::PEER_TIMEOUT);
        if new.is_some() || !lost.is_empty() {
            let update = PeerUpdate { peers: tracker.peers(), new, lost };
            if peer_tx.send(update).await.is_err() {
                return Ok(());
            }
        }
    }
}
