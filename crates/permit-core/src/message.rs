//! Node identities and the two protocol messages.
//!
//! Messages are immutable once sent. A `Request` carries the sender's
//! Lamport timestamp; a `Reply` only names the node granting permission.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node. Ids are positive; a run with `n` nodes uses `1..=n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns `None` for the reserved id `0`.
    pub fn new(id: u32) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// All ids of a cluster of `count` nodes, in ascending order.
    pub fn range(count: u32) -> impl Iterator<Item = NodeId> {
        (1..=count).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A protocol message exchanged between nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Ask every peer for permission to enter the critical section.
    Request { timestamp: u64, sender: NodeId },
    /// Grant permission to a requester.
    Reply { sender: NodeId },
}

impl Message {
    pub fn sender(&self) -> NodeId {
        match self {
            Message::Request { sender, .. } | Message::Reply { sender } => *sender,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request { .. })
    }
}
