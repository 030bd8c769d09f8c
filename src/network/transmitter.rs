//! # Reliable transmitter
//!
//! At-least-once delivery for one message kind on top of unreliable datagrams.
//!
//! Outgoing envelopes queue up in FIFO order and only the head is ever in flight. The head is
//! resent every [`config::REPLY_TIMEOUT`] until a reply with its UUID arrives, then the next
//! envelope goes out. When the ring successor changes every queued envelope is readdressed,
//! but nothing is resent until the next timeout or reply.
//!
//! [`ReliableTransmitter`] holds the queue logic and is driven synchronously; [`run`] wraps it
//! in a task that owns the retry timer.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config;
use crate::elevator_logic::timer::Timer;
use crate::print;
use crate::world_view::NodeId;
use super::message::{short_uuid, Envelope, MsgKind};

/// Commands accepted by a transmitter task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitterCmd {
    /// Queue an envelope for reliable delivery.
    Send(Envelope),
    /// A reply carrying this UUID came back.
    Reply(Uuid),
    /// The ring successor changed. `None` while disconnected.
    SetRecipient(Option<NodeId>),
    /// Drop everything queued. The caller has already resolved it some other way.
    Flush,
}

/// Outcome of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The UUID did not match the head. Nothing changed.
    Ignored,
    /// The head was acknowledged and this envelope is the new head, to be transmitted.
    Next(Envelope),
    /// The head was acknowledged and the queue is empty. A new head without a recipient
    /// also ends up here.
    Drained,
}

/// Queue state of one transmitter.
#[derive(Debug)]
pub struct ReliableTransmitter {
    kind: MsgKind,
    buffer: VecDeque<Envelope>,
    recipient: Option<NodeId>,
}

impl ReliableTransmitter {
    pub fn new(kind: MsgKind) -> Self {
        Self { kind, buffer: VecDeque::new(), recipient: None }
    }

    pub fn kind(&self) -> MsgKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Envelope currently in flight.
    pub fn head(&self) -> Option<&Envelope> {
        self.buffer.front()
    }

    /// Appends `envelope`, addressed to the current recipient.
    ///
    /// Returns the envelope to transmit right away if the queue was empty.
    pub fn enqueue(&mut self, mut envelope: Envelope) -> Option<Envelope> {
        if let Some(recipient) = self.recipient {
            envelope.recipient = recipient;
        }
        self.buffer.push_back(envelope);
        if self.buffer.len() == 1 {
            return self.transmittable_head();
        }
        None
    }

    /// Pops the head if `uuid` acknowledges it.
    pub fn on_reply(&mut self, uuid: Uuid) -> ReplyOutcome {
        match self.buffer.front() {
            Some(head) if head.uuid == uuid => {
                self.buffer.pop_front();
                match self.transmittable_head() {
                    Some(next) => ReplyOutcome::Next(next),
                    None => ReplyOutcome::Drained,
                }
            }
            _ => ReplyOutcome::Ignored,
        }
    }

    /// Envelope to resend after a retry timeout.
    pub fn on_timeout(&self) -> Option<Envelope> {
        self.transmittable_head()
    }

    /// Readdresses every queued envelope, and every future one, to `recipient`.
    pub fn set_recipient(&mut self, recipient: Option<NodeId>) {
        self.recipient = recipient;
        if let Some(recipient) = recipient {
            for envelope in self.buffer.iter_mut() {
                envelope.recipient = recipient;
            }
        }
    }

    /// Empties the queue, in flight head included, and returns what was in it.
    pub fn flush(&mut self) -> Vec<Envelope> {
        self.buffer.drain(..).collect()
    }

    fn transmittable_head(&self) -> Option<Envelope> {
        self.recipient?;
        self.buffer.front().cloned()
    }
}

/// Runs one transmitter until its command channel closes.
///
/// Transmissions are handed to the datagram sender on `datagram_tx`.
pub async fn run(
    mut transmitter: ReliableTransmitter,
    mut cmd_rx: mpsc::UnboundedReceiver<TransmitterCmd>,
    datagram_tx: mpsc::UnboundedSender<Envelope>,
) {
    let mut retry = Timer::new(config::REPLY_TIMEOUT);
    let kind = transmitter.kind();

    let transmit = |envelope: Envelope| {
        if datagram_tx.send(envelope).is_err() {
            print::err(format!("{:?} transmitter lost its datagram sender", kind));
        }
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    TransmitterCmd::Send(envelope) => {
                        if let Some(head) = transmitter.enqueue(envelope) {
                            transmit(head);
                        }
                    }
                    TransmitterCmd::Reply(uuid) => match transmitter.on_reply(uuid) {
                        ReplyOutcome::Next(head) => {
                            transmit(head);
                            retry.start();
                        }
                        ReplyOutcome::Drained => retry.stop(),
                        ReplyOutcome::Ignored => {}
                    },
                    TransmitterCmd::SetRecipient(recipient) => transmitter.set_recipient(recipient),
                    TransmitterCmd::Flush => {
                        let dropped = transmitter.flush();
                        if !dropped.is_empty() {
                            print::warn(format!("{:?} transmitter dropped {} queued envelope(s)", kind, dropped.len()));
                        }
                        retry.stop();
                    }
                }
                if !transmitter.is_empty() && !retry.is_active() {
                    retry.start();
                }
            }
            _ = retry.wait() => {
                retry.take_timeout();
                if let Some(head) = transmitter.on_timeout() {
                    print::warn(format!("Resending {}", head));
                    transmit(head);
                } else if transmitter.is_empty() {
                    continue;
                } else {
                    print::warn(format!(
                        "{:?} transmitter has {} queued envelope(s) but no recipient, head {}",
                        kind,
                        transmitter.len(),
                        transmitter.head().map(|h| short_uuid(&h.uuid)).unwrap_or_default()
                    ));
                }
                retry.start();
            }
        }
    }
}
