//! The per-node actor loop.
//!
//! A [`NodeActor`] drives one [`ProtocolState`] over its own mailbox. It
//! runs as an independent tokio task: think, request, wait for permission,
//! run the critical section through the [`Coordinator`], reply to deferred
//! peers, repeat until the termination signal is raised.

use crate::coordinator::{Coordinator, SectionOutcome};
use crate::error::{Result, SimError};
use crate::event::SimulationEvent;
use crate::router::{Envelope, Mailbox, MessageRouter};
use permit_core::{Message, NodeId, ProtocolState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Counters reported by an actor when it stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStats {
    pub node: NodeId,
    /// Requests broadcast.
    pub requests: u64,
    /// Critical sections entered.
    pub sections: u64,
    /// Replies sent, deferred ones included.
    pub replies: u64,
}

/// One node of the cluster.
pub struct NodeActor<R: MessageRouter> {
    state: ProtocolState,
    mailbox: Mailbox,
    router: Arc<R>,
    coordinator: Arc<Coordinator>,
    termination: watch::Receiver<bool>,
    think_delay_ms: u64,
    rng: StdRng,
    stats: ActorStats,
}

impl<R: MessageRouter> NodeActor<R> {
    pub fn new(mailbox: Mailbox, router: Arc<R>, coordinator: Arc<Coordinator>) -> Self {
        let id = mailbox.owner();
        let state = ProtocolState::new(id, router.members());
        let termination = coordinator.subscribe_termination();

        Self {
            state,
            mailbox,
            router,
            coordinator,
            termination,
            think_delay_ms: 0,
            rng: StdRng::from_entropy(),
            stats: ActorStats {
                node: id,
                requests: 0,
                sections: 0,
                replies: 0,
            },
        }
    }

    /// Pause up to `ms` milliseconds before each request.
    pub fn with_think_delay(mut self, ms: u64, seed: Option<u64>) -> Self {
        self.think_delay_ms = ms;
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(self.id().get())));
        }
        self
    }

    pub fn id(&self) -> NodeId {
        self.state.id()
    }

    /// Run until termination or failure, then depart.
    pub async fn run(mut self) -> ActorStats {
        if let Err(error) = self.participate().await {
            warn!(node = %self.id(), error = %error, "node leaving after failure");
            if !matches!(error, SimError::Resource(_)) {
                self.coordinator.record_failure(self.id(), error.to_string());
            }
        }
        self.depart().await;
        self.stats
    }

    async fn participate(&mut self) -> Result<()> {
        loop {
            if self.terminated() {
                return Ok(());
            }

            self.think().await?;
            if self.terminated() {
                return Ok(());
            }

            let Some(request) = self.state.begin_request() else {
                return Ok(());
            };
            if let Message::Request { timestamp, .. } = request {
                debug!(node = %self.id(), timestamp, "requesting critical section");
                self.coordinator.emit(SimulationEvent::Requested {
                    node: self.id(),
                    timestamp,
                });
            }
            self.stats.requests += 1;
            self.router.broadcast(self.id(), request).await?;

            if !self.await_permission().await? {
                return Ok(());
            }

            if !self.state.enter() {
                return Ok(());
            }
            self.stats.sections += 1;
            self.coordinator
                .emit(SimulationEvent::Entered { node: self.id() });
            // Store I/O blocks; keep it off the async workers.
            let coordinator = self.coordinator.clone();
            let id = self.id();
            let result = tokio::task::spawn_blocking(move || coordinator.critical_section(id))
                .await
                .map_err(|e| SimError::ActorAborted {
                    node: id,
                    reason: e.to_string(),
                })?;

            let waiters = self.state.exit();
            self.reply_all(waiters).await?;

            match result? {
                SectionOutcome::Claimed(claim) => {
                    trace!(node = %self.id(), index = claim.index, "left section after claim");
                }
                SectionOutcome::NotFound | SectionOutcome::Skipped => {}
            }
        }
    }

    fn terminated(&self) -> bool {
        *self.termination.borrow()
    }

    /// Wait for every peer's reply while answering incoming traffic.
    /// Returns false if the run terminated first.
    async fn await_permission(&mut self) -> Result<bool> {
        while !self.state.is_ready() {
            if self.terminated() {
                return Ok(false);
            }
            tokio::select! {
                biased;
                changed = self.termination.changed() => {
                    if changed.is_err() {
                        return Ok(false);
                    }
                }
                envelope = self.mailbox.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope).await?,
                    None => return Ok(false),
                },
            }
        }
        Ok(true)
    }

    /// Random pause before the next request. Requests that arrive meanwhile
    /// are still answered.
    async fn think(&mut self) -> Result<()> {
        if self.think_delay_ms == 0 {
            return Ok(());
        }
        let pause = Duration::from_millis(self.rng.gen_range(0..=self.think_delay_ms));
        let deadline = tokio::time::sleep(pause);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(()),
                _ = self.termination.changed() => return Ok(()),
                envelope = self.mailbox.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope).await?,
                    None => return Ok(()),
                },
            }
        }
    }

    async fn dispatch(&mut self, envelope: Envelope) -> Result<()> {
        trace!(node = %self.id(), from = %envelope.from, message = ?envelope.message, "received");
        if let Some(reply) = self.state.handle(envelope.message) {
            self.send_reply(envelope.from, reply).await?;
        }
        Ok(())
    }

    async fn reply_all(&mut self, waiters: Vec<NodeId>) -> Result<()> {
        let reply = Message::Reply {
            sender: self.id(),
        };
        for waiter in waiters {
            self.send_reply(waiter, reply).await?;
        }
        Ok(())
    }

    async fn send_reply(&mut self, to: NodeId, reply: Message) -> Result<()> {
        self.router.send(to, Envelope::new(self.id(), reply)).await?;
        self.stats.replies += 1;
        Ok(())
    }

    /// Become Done: flush deferred replies, leave the router, then answer
    /// whatever was already queued in the mailbox.
    async fn depart(&mut self) {
        let waiters = self.state.finish();
        if let Err(error) = self.reply_all(waiters).await {
            warn!(node = %self.id(), error = %error, "could not flush deferred replies");
        }

        self.router.depart(self.id());
        while let Some(envelope) = self.mailbox.try_recv() {
            if let Err(error) = self.dispatch(envelope).await {
                warn!(node = %self.id(), error = %error, "could not answer queued message");
            }
        }

        debug!(
            node = %self.id(),
            requests = self.stats.requests,
            sections = self.stats.sections,
            "node done"
        );
        self.coordinator
            .emit(SimulationEvent::Finished { node: self.id() });
    }
}
