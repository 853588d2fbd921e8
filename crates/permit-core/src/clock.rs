//! Lamport logical clock and the request ordering built on top of it.
//!
//! Every locally initiated request ticks the clock. Pairing the resulting
//! timestamp with the node id gives a total order over requests:
//!  - smaller timestamp wins
//!  - ties are broken by the smaller node id
//!
//! Because node ids are unique, two distinct requests never compare equal.

use crate::message::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A per-node Lamport counter. Never decreases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    time: u64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self { time: 0 }
    }

    /// Start from a given time (used by tests and simulations that
    /// want a particular request order).
    pub fn starting_at(time: u64) -> Self {
        Self { time }
    }

    /// Advance for a new local event and return the new time.
    pub fn tick(&mut self) -> u64 {
        self.time += 1;
        self.time
    }

    /// Lamport receive rule without the trailing tick: catch up to a
    /// timestamp observed on an incoming message.
    pub fn witness(&mut self, timestamp: u64) {
        self.time = self.time.max(timestamp);
    }

    pub fn time(&self) -> u64 {
        self.time
    }
}

/// The `(timestamp, node id)` pair a request is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestStamp {
    pub timestamp: u64,
    pub node: NodeId,
}

impl RequestStamp {
    pub fn new(timestamp: u64, node: NodeId) -> Self {
        Self { timestamp, node }
    }

    /// True if this request must be served before `other`.
    pub fn has_priority_over(&self, other: &RequestStamp) -> bool {
        self < other
    }
}

impl Ord for RequestStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for RequestStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
