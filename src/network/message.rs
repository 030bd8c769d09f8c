//! # Protocol messages
//!
//! Every message travels in an [`Envelope`]: a fixed binary header followed by a JSON body.
//!
//! ```text
//! byte 0      author_id
//! byte 1      recipient
//! byte 2      loop_counter
//! bytes 3..19 uuid
//! bytes 19..  JSON content, tagged by kind: {"Bid":{...}}
//! ```
//!
//! The kind is carried by the JSON tag, so one port per node is enough and a decoded
//! envelope always knows which reliable transmitter it belongs to.

use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::elevio::Order;
use crate::world_view::{NodeId, OrderTable};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 19;

/// Cost-collection round for a hall call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BidMsg {
    pub order: Order,
    /// Estimated milliseconds to service, indexed by node ID. `None` if the node has not
    /// bid or opted out.
    pub time_to_served: Vec<Option<u64>>,
    /// Node currently holding the order, if it is being moved away from someone.
    pub old_assignee: Option<NodeId>,
}

/// Declares which car serves an order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssignMsg {
    pub order: Order,
    pub new_assignee: NodeId,
    pub old_assignee: Option<NodeId>,
}

/// The author has served an order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServedMsg {
    pub order: Order,
}

/// Full order table snapshot for `target_id` to merge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncMsg {
    pub orders: OrderTable,
    pub target_id: NodeId,
}

/// Closed set of message contents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bid(BidMsg),
    Assign(AssignMsg),
    Served(ServedMsg),
    Sync(SyncMsg),
}

/// Message kind. Each kind has its own reliable transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    Bid,
    Assign,
    Served,
    Sync,
}

impl MsgKind {
    pub const ALL: [MsgKind; 4] = [MsgKind::Bid, MsgKind::Assign, MsgKind::Served, MsgKind::Sync];
}

impl Content {
    pub fn kind(&self) -> MsgKind {
        match self {
            Content::Bid(_) => MsgKind::Bid,
            Content::Assign(_) => MsgKind::Assign,
            Content::Served(_) => MsgKind::Served,
            Content::Sync(_) => MsgKind::Sync,
        }
    }
}

/// A protocol message on its way around the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub author_id: NodeId,
    pub recipient: NodeId,
    /// Hops travelled so far.
    pub loop_counter: u8,
    pub uuid: Uuid,
    pub content: Content,
}

impl Envelope {
    /// New envelope from `author_id` with a fresh UUID, not yet addressed.
    pub fn new(author_id: NodeId, content: Content) -> Self {
        Self {
            author_id,
            recipient: author_id,
            loop_counter: 0,
            uuid: Uuid::new_v4(),
            content,
        }
    }

    pub fn kind(&self) -> MsgKind {
        self.content.kind()
    }

    /// The next hop of this envelope: one more hop, addressed to `next`.
    pub fn forwarded_to(mut self, next: NodeId) -> Self {
        self.loop_counter = self.loop_counter.saturating_add(1);
        self.recipient = next;
        self
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} from {} to {} (hop {})",
            self.kind(),
            short_uuid(&self.uuid),
            self.author_id,
            self.recipient,
            self.loop_counter
        )
    }
}

/// Formats a UUID as five hyphen-separated uppercase hex groups.
pub fn short_uuid(uuid: &Uuid) -> String {
    format!("{:X}", uuid.hyphenated())
}

/// Failure to decode a received datagram.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("datagram of {0} bytes is shorter than the {HEADER_SIZE}-byte header")]
    TooShort(usize),

    #[error("invalid content: {0}")]
    Content(#[from] serde_json::Error),
}

/// Serializes an envelope to wire format.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let body = serde_json::to_vec(&envelope.content)?;
    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.push(envelope.author_id);
    bytes.push(envelope.recipient);
    bytes.push(envelope.loop_counter);
    bytes.extend_from_slice(envelope.uuid.as_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Parses an envelope from wire format.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::TooShort(bytes.len()));
    }
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&bytes[3..HEADER_SIZE]);
    let content: Content = serde_json::from_slice(&bytes[HEADER_SIZE..])?;

    Ok(Envelope {
        author_id: bytes[0],
        recipient: bytes[1],
        loop_counter: bytes[2],
        uuid: Uuid::from_bytes(uuid),
        content,
    })
}
