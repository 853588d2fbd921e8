//! Mailboxes and message routing between node actors.
//!
//! Every node owns a [`Mailbox`]. Sending enqueues an [`Envelope`] into the
//! receiver's unbounded channel; the receiver handles it at its own next
//! scheduling point. Messages from one sender arrive in the order they were
//! sent. There is no ordering across senders.
//!
//! A node that stops participating *departs*: it is removed from the router
//! and every later request addressed to it is answered by the router with a
//! `Reply` on its behalf. A departed node can no longer compete, so granting
//! in its name is always safe, and requesters are never left waiting on it.

use crate::error::{Result, SimError};
use async_trait::async_trait;
use parking_lot::RwLock;
use permit_core::{Message, NodeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

/// A message together with the node that sent it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub from: NodeId,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: NodeId, message: Message) -> Self {
        Self { from, message }
    }
}

/// What happened to a sent envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueued into the receiver's mailbox.
    Delivered,
    /// The receiver has departed; the router replied on its behalf.
    AnsweredOnBehalf,
    /// The receiver has departed and the message needs no answer.
    Dropped,
}

/// The receiving end owned by one node.
pub struct Mailbox {
    owner: NodeId,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Mailbox {
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Wait for the next envelope. `None` once the router is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Take an already queued envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox").field("owner", &self.owner).finish()
    }
}

/// Routing between the nodes of one cluster.
#[async_trait]
pub trait MessageRouter: Send + Sync + 'static {
    /// Send one envelope to `to`.
    async fn send(&self, to: NodeId, envelope: Envelope) -> Result<Delivery>;

    /// Send `message` from `from` to every other member. Returns the number
    /// of members addressed.
    async fn broadcast(&self, from: NodeId, message: Message) -> Result<usize>;

    /// Every node of the cluster, departed or not.
    fn members(&self) -> Vec<NodeId>;

    /// Whether `node` still receives messages.
    fn is_present(&self, node: NodeId) -> bool;

    /// Remove `node`. Messages already queued for it stay in its mailbox.
    fn depart(&self, node: NodeId);
}

/// In-memory router backed by tokio channels.
pub struct MemoryRouter {
    members: Vec<NodeId>,
    inboxes: RwLock<HashMap<NodeId, mpsc::UnboundedSender<Envelope>>>,
    sent: AtomicU64,
}

impl MemoryRouter {
    /// Create a router for `members` and return one mailbox per member, in
    /// the same order.
    pub fn new(members: impl IntoIterator<Item = NodeId>) -> (Self, Vec<Mailbox>) {
        let members: Vec<NodeId> = members.into_iter().collect();
        let mut inboxes = HashMap::with_capacity(members.len());
        let mut mailboxes = Vec::with_capacity(members.len());

        for &owner in &members {
            let (tx, rx) = mpsc::unbounded_channel();
            inboxes.insert(owner, tx);
            mailboxes.push(Mailbox { owner, rx });
        }

        let router = Self {
            members,
            inboxes: RwLock::new(inboxes),
            sent: AtomicU64::new(0),
        };
        (router, mailboxes)
    }

    /// Router for nodes `1..=count`.
    pub fn with_cluster(count: u32) -> (Self, Vec<Mailbox>) {
        Self::new(NodeId::range(count))
    }

    /// Total envelopes accepted so far, including answers made on behalf of
    /// departed nodes.
    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn route(&self, to: NodeId, envelope: Envelope) -> Result<Delivery> {
        if !self.members.contains(&to) {
            return Err(SimError::UnknownNode(to));
        }

        let inboxes = self.inboxes.read();
        let envelope = match inboxes.get(&to) {
            Some(tx) => match tx.send(envelope) {
                Ok(()) => {
                    self.sent.fetch_add(1, Ordering::Relaxed);
                    return Ok(Delivery::Delivered);
                }
                // The mailbox was dropped without departing; treat it the same.
                Err(mpsc::error::SendError(envelope)) => envelope,
            },
            None => envelope,
        };

        match envelope.message {
            Message::Request { .. } => {
                let answer = Envelope::new(to, Message::Reply { sender: to });
                if let Some(tx) = inboxes.get(&envelope.from) {
                    if tx.send(answer).is_ok() {
                        self.sent.fetch_add(1, Ordering::Relaxed);
                    }
                }
                trace!(to = %to, requester = %envelope.from, "answered request for departed node");
                Ok(Delivery::AnsweredOnBehalf)
            }
            Message::Reply { .. } => {
                trace!(to = %to, from = %envelope.from, "dropped reply to departed node");
                Ok(Delivery::Dropped)
            }
        }
    }
}

#[async_trait]
impl MessageRouter for MemoryRouter {
    async fn send(&self, to: NodeId, envelope: Envelope) -> Result<Delivery> {
        self.route(to, envelope)
    }

    async fn broadcast(&self, from: NodeId, message: Message) -> Result<usize> {
        let mut count = 0;
        for &to in self.members.iter().filter(|m| **m != from) {
            self.route(to, Envelope::new(from, message))?;
            count += 1;
        }
        Ok(count)
    }

    fn members(&self) -> Vec<NodeId> {
        self.members.clone()
    }

    fn is_present(&self, node: NodeId) -> bool {
        self.inboxes.read().contains_key(&node)
    }

    fn depart(&self, node: NodeId) {
        self.inboxes.write().remove(&node);
    }
}
