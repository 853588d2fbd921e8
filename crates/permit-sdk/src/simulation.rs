//! Running a whole cluster and collecting the result.

use crate::actor::{ActorStats, NodeActor};
use crate::config::{ExhaustionPolicy, SimulationConfig};
use crate::coordinator::{Coordinator, NodeOutcome, TerminationState};
use crate::error::{Result, SimError};
use crate::event::SimulationEvent;
use crate::router::{Mailbox, MemoryRouter};
use futures::future::join_all;
use permit_core::NodeId;
use permit_resource::{Claim, LineStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// How one node's participation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: NodeId,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
    pub requests: u64,
    pub sections: u64,
}

/// Everything known about a finished run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub policy: ExhaustionPolicy,
    pub rows: u32,
    pub cols: u32,
    /// One entry per node, in id order.
    pub nodes: Vec<NodeReport>,
    pub claim: Option<Claim>,
    pub termination: TerminationState,
    pub critical_sections: u64,
    pub peak_occupancy: usize,
    pub messages_sent: u64,
}

impl SimulationReport {
    /// The node that claimed a line, if any.
    pub fn winner(&self) -> Option<NodeId> {
        self.claim.as_ref().map(|c| c.node)
    }

    /// Every node that did not claim, failed ones included.
    pub fn non_claimants(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| !matches!(n.outcome, NodeOutcome::Claimed { .. }))
            .map(|n| n.node)
    }

    /// Nodes that left because of an error, with the error text.
    pub fn failures(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.nodes.iter().filter_map(|n| match &n.outcome {
            NodeOutcome::Failed { error } => Some((n.node, error.as_str())),
            _ => None,
        })
    }

    /// Whether the critical section was ever occupied by more than one node.
    pub fn mutual_exclusion_held(&self) -> bool {
        self.peak_occupancy <= 1
    }
}

/// A configured cluster, ready to run once.
pub struct Simulation {
    config: SimulationConfig,
    router: Arc<MemoryRouter>,
    coordinator: Arc<Coordinator>,
    mailboxes: Vec<Mailbox>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, store: impl LineStore) -> Result<Self> {
        config.validate()?;

        let (router, mailboxes) = MemoryRouter::with_cluster(config.node_count);
        let coordinator = Coordinator::new(store, config.policy, config.event_capacity);

        Ok(Self {
            config,
            router: Arc::new(router),
            coordinator: Arc::new(coordinator),
            mailboxes,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Subscribe to events. Subscribe before calling [`Simulation::run`] to
    /// see the run from the start.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.coordinator.subscribe()
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    /// Spawn one task per node and wait until every node is Done.
    pub async fn run(self) -> Result<SimulationReport> {
        info!(
            nodes = self.config.node_count,
            rows = self.config.rows,
            cols = self.config.cols,
            policy = %self.config.policy,
            store = %self.coordinator.store_location(),
            "starting simulation"
        );

        let mut nodes = Vec::with_capacity(self.mailboxes.len());
        let mut handles = Vec::with_capacity(self.mailboxes.len());
        for mailbox in self.mailboxes {
            nodes.push(mailbox.owner());
            let actor = NodeActor::new(mailbox, self.router.clone(), self.coordinator.clone())
                .with_think_delay(self.config.think_delay_ms, self.config.seed);
            handles.push(tokio::spawn(actor.run()));
        }

        let mut stats: Vec<ActorStats> = Vec::with_capacity(nodes.len());
        let mut aborted = None;
        for (node, joined) in nodes.iter().zip(join_all(handles).await) {
            match joined {
                Ok(s) => stats.push(s),
                Err(e) => {
                    warn!(node = %node, error = %e, "actor task aborted");
                    aborted.get_or_insert(SimError::ActorAborted {
                        node: *node,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if let Some(error) = aborted {
            return Err(error);
        }

        let report = SimulationReport {
            policy: self.config.policy,
            rows: self.config.rows,
            cols: self.config.cols,
            nodes: stats
                .iter()
                .map(|s| NodeReport {
                    node: s.node,
                    outcome: self.coordinator.outcome(s.node),
                    requests: s.requests,
                    sections: s.sections,
                })
                .collect(),
            claim: self.coordinator.resource().claim().cloned(),
            termination: self.coordinator.termination(),
            critical_sections: self.coordinator.sections_run(),
            peak_occupancy: self.coordinator.peak_occupancy(),
            messages_sent: self.router.messages_sent(),
        };

        info!(
            winner = ?report.winner(),
            sections = report.critical_sections,
            messages = report.messages_sent,
            "simulation finished"
        );
        Ok(report)
    }
}
