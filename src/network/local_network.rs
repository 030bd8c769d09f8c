//! # Local channels
//!
//! All background tasks talk to the control loop through the channels bundled here, and the
//! control loop talks back to the network only through its [`Outbox`].
//!
//! ```text
//! driver / peer listener / watchdog / udp receiver ──MpscTxs──▶ control loop
//! control loop ──Outbox──▶ reliable transmitters ──▶ udp sender
//!              └─(forward)──────────────────────────▶ udp sender
//! ```

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config;
use crate::elevio::ElevEvent;
use crate::print;
use crate::world_view::NodeId;
use super::message::{Envelope, MsgKind};
use super::transmitter::TransmitterCmd;
use super::udp_broadcast::PeerUpdate;
use super::watchdog::WatchdogEvent;

/// Senders into the control loop.
#[derive(Clone)]
pub struct MpscTxs {
    /// Events from the local elevator
    pub elevator: mpsc::Sender<ElevEvent>,
    /// Peer list changes from the peer listener
    pub peer_update: mpsc::Sender<PeerUpdate>,
    /// Successor reports from the watchdog
    pub watchdog: mpsc::Sender<WatchdogEvent>,
    /// Envelopes received over UDP
    pub incoming: mpsc::Sender<Envelope>,
}

/// Receivers owned by the control loop.
pub struct MpscRxs {
    pub elevator: mpsc::Receiver<ElevEvent>,
    pub peer_update: mpsc::Receiver<PeerUpdate>,
    pub watchdog: mpsc::Receiver<WatchdogEvent>,
    pub incoming: mpsc::Receiver<Envelope>,
}

/// Every channel into the control loop.
pub struct Mpscs {
    pub txs: MpscTxs,
    pub rxs: MpscRxs,
}

impl Mpscs {
    pub fn new() -> Self {
        let (elevator_tx, elevator_rx) = mpsc::channel(config::CHANNEL_SIZE);
        let (peer_update_tx, peer_update_rx) = mpsc::channel(config::CHANNEL_SIZE);
        let (watchdog_tx, watchdog_rx) = mpsc::channel(config::CHANNEL_SIZE);
        let (incoming_tx, incoming_rx) = mpsc::channel(config::CHANNEL_SIZE);

        Mpscs {
            txs: MpscTxs {
                elevator: elevator_tx,
                peer_update: peer_update_tx,
                watchdog: watchdog_tx,
                incoming: incoming_tx,
            },
            rxs: MpscRxs {
                elevator: elevator_rx,
                peer_update: peer_update_rx,
                watchdog: watchdog_rx,
                incoming: incoming_rx,
            },
        }
    }
}

impl Default for Mpscs {
    fn default() -> Self {
        Self::new()
    }
}

/// The control loop's way out: one command channel per reliable transmitter, plus direct
/// access to the datagram sender for unacknowledged hops.
#[derive(Clone)]
pub struct Outbox {
    bid: mpsc::UnboundedSender<TransmitterCmd>,
    assign: mpsc::UnboundedSender<TransmitterCmd>,
    served: mpsc::UnboundedSender<TransmitterCmd>,
    sync: mpsc::UnboundedSender<TransmitterCmd>,
    datagram: mpsc::UnboundedSender<Envelope>,
}

/// Receiving ends of an [`Outbox`]: one per transmitter task, and the datagram sender's input.
pub struct OutboxRxs {
    pub bid: mpsc::UnboundedReceiver<TransmitterCmd>,
    pub assign: mpsc::UnboundedReceiver<TransmitterCmd>,
    pub served: mpsc::UnboundedReceiver<TransmitterCmd>,
    pub sync: mpsc::UnboundedReceiver<TransmitterCmd>,
    pub datagram: mpsc::UnboundedReceiver<Envelope>,
}

impl OutboxRxs {
    /// Command receiver of `kind`'s transmitter.
    pub fn commands(&mut self, kind: MsgKind) -> &mut mpsc::UnboundedReceiver<TransmitterCmd> {
        match kind {
            MsgKind::Bid => &mut self.bid,
            MsgKind::Assign => &mut self.assign,
            MsgKind::Served => &mut self.served,
            MsgKind::Sync => &mut self.sync,
        }
    }
}

impl Outbox {
    pub fn new() -> (Outbox, OutboxRxs) {
        let (bid_tx, bid_rx) = mpsc::unbounded_channel();
        let (assign_tx, assign_rx) = mpsc::unbounded_channel();
        let (served_tx, served_rx) = mpsc::unbounded_channel();
        let (sync_tx, sync_rx) = mpsc::unbounded_channel();
        let (datagram_tx, datagram_rx) = mpsc::unbounded_channel();

        (
            Outbox { bid: bid_tx, assign: assign_tx, served: served_tx, sync: sync_tx, datagram: datagram_tx },
            OutboxRxs { bid: bid_rx, assign: assign_rx, served: served_rx, sync: sync_rx, datagram: datagram_rx },
        )
    }

    fn transmitter(&self, kind: MsgKind) -> &mpsc::UnboundedSender<TransmitterCmd> {
        match kind {
            MsgKind::Bid => &self.bid,
            MsgKind::Assign => &self.assign,
            MsgKind::Served => &self.served,
            MsgKind::Sync => &self.sync,
        }
    }

    fn command(&self, kind: MsgKind, cmd: TransmitterCmd) {
        if self.transmitter(kind).send(cmd).is_err() {
            print::err(format!("{:?} transmitter is gone", kind));
        }
    }

    /// Hands an envelope to its kind's reliable transmitter.
    pub fn send(&self, envelope: Envelope) {
        self.command(envelope.kind(), TransmitterCmd::Send(envelope));
    }

    /// Acknowledges the in-flight envelope of `kind`.
    pub fn reply(&self, kind: MsgKind, uuid: Uuid) {
        self.command(kind, TransmitterCmd::Reply(uuid));
    }

    /// Readdresses every transmitter to the new ring successor.
    pub fn set_recipient(&self, recipient: Option<NodeId>) {
        for kind in MsgKind::ALL {
            self.command(kind, TransmitterCmd::SetRecipient(recipient));
        }
    }

    /// Drops everything queued in `kind`'s transmitter.
    pub fn flush(&self, kind: MsgKind) {
        self.command(kind, TransmitterCmd::Flush);
    }

    /// Sends one hop without acknowledgement. The originator's transmitter covers losses.
    pub fn forward(&self, envelope: Envelope) {
        if self.datagram.send(envelope).is_err() {
            print::err("Datagram sender is gone".to_string());
        }
    }

    /// Sender for the transmitter tasks to hand their datagrams to.
    pub fn datagram_sender(&self) -> mpsc::UnboundedSender<Envelope> {
        self.datagram.clone()
    }
}
