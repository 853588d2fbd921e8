//! The Ricart–Agrawala state machine of a single node.
//!
//! `ProtocolState` is pure: it never sends anything itself. Each transition
//! returns what the caller has to put on the wire, which keeps the protocol
//! testable without a runtime and lets the actor layer own all I/O.
//!
//! ```text
//!            begin_request            enter                exit
//!   Idle ─────────────────▶ Requesting ─────▶ Executing ──────────▶ Idle
//!     │                         │                 │
//!     └───────── finish ────────┴──── finish ─────┴──────────▶ Done
//! ```
//!
//! # Reply decision
//!
//! On a request `(T, S)` the node answers at once when it is Idle or Done.
//! While Requesting it answers at once only if `(T, S)` is ordered before its
//! own pending request, and defers otherwise. While Executing it defers and
//! answers on exit. The node holding the globally smallest stamp is therefore
//! never deferred and is the first to collect all `N - 1` replies.

use crate::clock::{LamportClock, RequestStamp};
use crate::message::{Message, NodeId};
use std::collections::{BTreeSet, VecDeque};

/// Lifecycle phase of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Requesting,
    Executing,
    /// Terminal.
    Done,
}

/// What to do with an incoming request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyDecision {
    /// Send a `Reply` to the requester now.
    ReplyNow,
    /// The requester was queued and is answered on exit.
    Deferred,
}

/// Protocol state owned by exactly one node.
#[derive(Clone, Debug)]
pub struct ProtocolState {
    id: NodeId,
    peers: BTreeSet<NodeId>,
    phase: Phase,
    clock: LamportClock,
    request: Option<RequestStamp>,
    granted: BTreeSet<NodeId>,
    deferred: VecDeque<NodeId>,
}

impl ProtocolState {
    /// Create the state for `id` inside a cluster. `cluster` may or may not
    /// contain `id` itself; the node never counts itself as a peer.
    pub fn new(id: NodeId, cluster: impl IntoIterator<Item = NodeId>) -> Self {
        let peers = cluster.into_iter().filter(|peer| *peer != id).collect();
        Self {
            id,
            peers,
            phase: Phase::Idle,
            clock: LamportClock::new(),
            request: None,
            granted: BTreeSet::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Replace the clock, e.g. to start a node from a chosen time.
    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Stamp of the request currently pending or being served.
    pub fn request(&self) -> Option<RequestStamp> {
        self.request
    }

    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.peers.iter().copied()
    }

    /// Number of replies needed before entry (`N - 1`).
    pub fn expected_replies(&self) -> usize {
        self.peers.len()
    }

    pub fn granted_count(&self) -> usize {
        self.granted.len()
    }

    /// Requesters waiting for our reply, oldest first.
    pub fn deferred(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.deferred.iter().copied()
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// All replies collected; `enter` will succeed.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Requesting && self.granted.len() == self.peers.len()
    }

    /// Idle → Requesting. Ticks the clock and returns the request to send to
    /// every peer, or `None` when the node is not Idle.
    pub fn begin_request(&mut self) -> Option<Message> {
        if self.phase != Phase::Idle {
            return None;
        }

        let timestamp = self.clock.tick();
        self.request = Some(RequestStamp::new(timestamp, self.id));
        self.granted.clear();
        self.phase = Phase::Requesting;

        Some(Message::Request {
            timestamp,
            sender: self.id,
        })
    }

    /// Apply the reply decision rule to a request from `sender`.
    pub fn on_request(&mut self, timestamp: u64, sender: NodeId) -> ReplyDecision {
        self.clock.witness(timestamp);

        match self.phase {
            Phase::Idle | Phase::Done => ReplyDecision::ReplyNow,
            Phase::Requesting => {
                let incoming = RequestStamp::new(timestamp, sender);
                let wins = self
                    .request
                    .map_or(true, |own| incoming.has_priority_over(&own));
                if wins {
                    ReplyDecision::ReplyNow
                } else {
                    self.deferred.push_back(sender);
                    ReplyDecision::Deferred
                }
            }
            Phase::Executing => {
                self.deferred.push_back(sender);
                ReplyDecision::Deferred
            }
        }
    }

    /// Record a reply. Returns true once every peer has replied.
    ///
    /// Replies outside of Requesting are stale and ignored; a second reply
    /// from the same peer is counted once.
    pub fn on_reply(&mut self, sender: NodeId) -> bool {
        if self.phase == Phase::Requesting && self.peers.contains(&sender) {
            self.granted.insert(sender);
        }
        self.is_ready()
    }

    /// Dispatch any message. Returns the reply to send back, if one is due.
    pub fn handle(&mut self, message: Message) -> Option<Message> {
        match message {
            Message::Request { timestamp, sender } => match self.on_request(timestamp, sender) {
                ReplyDecision::ReplyNow => Some(Message::Reply { sender: self.id }),
                ReplyDecision::Deferred => None,
            },
            Message::Reply { sender } => {
                self.on_reply(sender);
                None
            }
        }
    }

    /// Requesting → Executing. Fails (returns false) until all replies are in.
    pub fn enter(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.phase = Phase::Executing;
        true
    }

    /// Executing → Idle. Returns the deferred requesters, in arrival order,
    /// that must now be sent a `Reply`. Empty if the node was not Executing.
    pub fn exit(&mut self) -> Vec<NodeId> {
        if self.phase != Phase::Executing {
            return Vec::new();
        }
        self.phase = Phase::Idle;
        self.request = None;
        self.granted.clear();
        self.deferred.drain(..).collect()
    }

    /// Any phase → Done. Flushes the deferred queue so no peer is left
    /// waiting on a node that stopped participating.
    pub fn finish(&mut self) -> Vec<NodeId> {
        self.phase = Phase::Done;
        self.request = None;
        self.granted.clear();
        self.deferred.drain(..).collect()
    }
}
