//! ## Envelope transport
//!
//! Node `n` receives envelopes on its own port, [`ElevConfig::message_port`]. Outgoing
//! envelopes go to the recipient's learned IP address, or to the broadcast address on the
//! recipient's port while its address is still unknown.

use std::net::{IpAddr, SocketAddr};
use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::config::{self, ElevConfig};
use crate::print;
use super::message::{self, Envelope};
use super::udp_broadcast::{broadcast_socket, PeerAddrs};

/// Where to send an envelope for `recipient`.
pub fn destination(config: &ElevConfig, addrs: &PeerAddrs, recipient: u8) -> anyhow::Result<SocketAddr> {
    let ip = match addrs.get(&recipient) {
        Some(ip) => *ip,
        None => config::BC_ADDR.parse::<IpAddr>()?,
    };
    Ok(SocketAddr::new(ip, config.message_port(recipient)))
}

/// Sends every envelope handed over on `datagram_rx`. Failures drop the single datagram;
/// the reliable transmitters take care of resending.
///
/// ## Note
/// This function is permanently blocking, and should be called asynchronously
pub async fn start_udp_sender(
    config: ElevConfig,
    mut datagram_rx: mpsc::UnboundedReceiver<Envelope>,
    addrs: watch::Receiver<PeerAddrs>,
) -> anyhow::Result<()> {
    let socket = broadcast_socket(0).context("binding envelope sender socket")?;

    while let Some(envelope) = datagram_rx.recv().await {
        let bytes = match message::encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                print::err(format!("Failed to encode {}: {}", envelope, e));
                continue;
            }
        };
        let target = {
            let addrs = addrs.borrow();
            destination(&config, &addrs, envelope.recipient)
        };
        match target {
            Ok(target) => {
                if let Err(e) = socket.send_to(&bytes, target).await {
                    print::warn(format!("Failed to send {} to {}: {}", envelope, target, e));
                }
            }
            Err(e) => print::err(format!("No destination for {}: {}", envelope, e)),
        }
    }
    Ok(())
}

/// Receives envelopes addressed to this node and hands them to the control loop.
///
/// ## Behaviour
/// - Reads with a bounded timeout so the task never blocks indefinitely.
/// - Malformed datagrams and envelopes for other nodes are logged and skipped.
///
/// ## Note
/// This function is permanently blocking, and should be called asynchronously
pub async fn start_udp_receiver(config: ElevConfig, incoming_tx: mpsc::Sender<Envelope>) -> anyhow::Result<()> {
    let socket = broadcast_socket(config.message_port(config.node_id))
        .context("binding envelope receiver socket")?;
    let mut buf = vec![0u8; config::UDP_BUFFER];

    loop {
        let (len, from) = match time::timeout(config::RECV_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                print::warn(format!("Failed to receive envelope: {}", e));
                continue;
            }
            Err(_) => continue,
        };

        let envelope = match message::decode(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(e) => {
                print::warn(format!("Dropping datagram from {}: {}", from, e));
                continue;
            }
        };
        if envelope.recipient != config.node_id {
            print::warn(format!("Dropping {} addressed to someone else", envelope));
            continue;
        }
        if incoming_tx.send(envelope).await.is_err() {
            return Ok(());
        }
    }
}
