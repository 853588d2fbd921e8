//! Shared-state manager and termination detector.
//!
//! The coordinator owns everything nodes share: the [`SharedResource`], its
//! backing store and the [`TerminationState`]. Access goes through
//! [`Coordinator::critical_section`], which holds one exclusive region for
//! the whole "check termination → search → update termination" sequence.
//!
//! The Ricart–Agrawala exchange is what keeps nodes out of each other's way;
//! the lock only makes the region atomic. An occupancy counter is taken
//! *before* the lock, so two nodes that were both granted entry show up as a
//! peak above one even though the lock would serialize them.

use crate::config::ExhaustionPolicy;
use crate::event::SimulationEvent;
use parking_lot::Mutex;
use permit_core::NodeId;
use permit_resource::{Claim, LineStore, ResourceError, SharedResource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Global termination flags. Once `resource_exhausted` is set it stays set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationState {
    pub resource_exhausted: bool,
    pub claimed: bool,
}

/// Result of one critical section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionOutcome {
    /// The node claimed a line.
    Claimed(Claim),
    /// The node searched and found nothing.
    NotFound,
    /// Termination was already decided; nothing was read or written.
    Skipped,
}

/// How a node's participation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    Claimed { claim: Claim },
    NoMatch,
    Failed { error: String },
}

#[derive(Debug, Default)]
struct Shared {
    resource: SharedResource,
    termination: TerminationState,
    outcomes: BTreeMap<NodeId, NodeOutcome>,
    sections: u64,
}

/// Decrements the occupancy counter when the section ends, even on error.
struct Occupant<'a> {
    occupancy: &'a AtomicUsize,
}

impl<'a> Occupant<'a> {
    fn enter(occupancy: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { occupancy }
    }
}

impl Drop for Occupant<'_> {
    fn drop(&mut self) {
        self.occupancy.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The shared-state manager of one run.
pub struct Coordinator {
    store: Box<dyn LineStore>,
    policy: ExhaustionPolicy,
    shared: Mutex<Shared>,
    occupancy: AtomicUsize,
    peak_occupancy: AtomicUsize,
    failures: AtomicU64,
    termination_tx: watch::Sender<bool>,
    event_tx: broadcast::Sender<SimulationEvent>,
}

impl Coordinator {
    pub fn new(store: impl LineStore, policy: ExhaustionPolicy, event_capacity: usize) -> Self {
        let (termination_tx, _) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));

        Self {
            store: Box::new(store),
            policy,
            shared: Mutex::new(Shared::default()),
            occupancy: AtomicUsize::new(0),
            peak_occupancy: AtomicUsize::new(0),
            failures: AtomicU64::new(0),
            termination_tx,
            event_tx,
        }
    }

    pub fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    /// Location of the backing store, for logs.
    pub fn store_location(&self) -> String {
        self.store.describe()
    }

    /// Receiver that flips to `true` when the run is over.
    pub fn subscribe_termination(&self) -> watch::Receiver<bool> {
        self.termination_tx.subscribe()
    }

    /// Subscribe to simulation events.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SimulationEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn is_terminated(&self) -> bool {
        *self.termination_tx.borrow()
    }

    pub fn termination(&self) -> TerminationState {
        self.shared.lock().termination
    }

    /// Copy of the resource as last seen inside a critical section.
    pub fn resource(&self) -> SharedResource {
        self.shared.lock().resource.clone()
    }

    /// Highest number of nodes ever inside the critical section at once.
    pub fn peak_occupancy(&self) -> usize {
        self.peak_occupancy.load(Ordering::SeqCst)
    }

    /// Critical sections run so far, skipped ones included.
    pub fn sections_run(&self) -> u64 {
        self.shared.lock().sections
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Outcome recorded for `node`. Nodes that never searched count as
    /// `NoMatch`.
    pub fn outcome(&self, node: NodeId) -> NodeOutcome {
        self.shared
            .lock()
            .outcomes
            .get(&node)
            .cloned()
            .unwrap_or(NodeOutcome::NoMatch)
    }

    /// Record that `node` left the run for a reason other than the store.
    pub(crate) fn record_failure(&self, node: NodeId, error: String) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.emit(SimulationEvent::Failed {
            node,
            error: error.clone(),
        });
        self.shared
            .lock()
            .outcomes
            .insert(node, NodeOutcome::Failed { error });
    }

    /// Run the critical section for `node`.
    ///
    /// Must only be called by a node that holds permission from every peer.
    /// A store error is recorded as that node's outcome and returned; it does
    /// not end the run for the others.
    ///
    /// Store I/O runs under the lock and blocks the calling thread. Async
    /// callers run this on the blocking pool.
    pub fn critical_section(&self, node: NodeId) -> Result<SectionOutcome, ResourceError> {
        let _occupant = Occupant::enter(&self.occupancy, &self.peak_occupancy);
        let mut shared = self.shared.lock();
        shared.sections += 1;

        if shared.termination.resource_exhausted {
            debug!(node = %node, "critical section skipped, run already terminated");
            return Ok(SectionOutcome::Skipped);
        }

        match self.search(&mut shared, node) {
            Ok(Some(claim)) => {
                info!(
                    node = %node,
                    index = claim.index,
                    matched = %claim.matched,
                    "claimed palindrome"
                );
                shared
                    .outcomes
                    .insert(node, NodeOutcome::Claimed { claim: claim.clone() });
                self.emit(SimulationEvent::Claimed(claim.clone()));
                shared.termination.claimed = true;
                self.terminate(&mut shared);
                Ok(SectionOutcome::Claimed(claim))
            }
            Ok(None) => {
                debug!(node = %node, policy = %self.policy, "no target found");
                shared.outcomes.entry(node).or_insert(NodeOutcome::NoMatch);
                self.emit(SimulationEvent::NotFound { node });
                let exhausted = match self.policy {
                    ExhaustionPolicy::SingleShot => true,
                    ExhaustionPolicy::Exhaustive => shared.resource.is_consumed(),
                };
                if exhausted {
                    self.terminate(&mut shared);
                }
                Ok(SectionOutcome::NotFound)
            }
            Err(error) => {
                warn!(node = %node, error = %error, "resource access failed");
                self.failures.fetch_add(1, Ordering::SeqCst);
                shared.outcomes.insert(
                    node,
                    NodeOutcome::Failed {
                        error: error.to_string(),
                    },
                );
                self.emit(SimulationEvent::Failed {
                    node,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Reload, search and (on a match) persist. Nothing in `shared` changes
    /// unless the store accepted the new content.
    fn search(&self, shared: &mut Shared, node: NodeId) -> Result<Option<Claim>, ResourceError> {
        let lines = self.store.load()?;

        let mut next = shared.resource.clone();
        next.replace_lines(lines);
        let claim = match self.policy {
            ExhaustionPolicy::SingleShot => next.claim_first(node),
            ExhaustionPolicy::Exhaustive => next.claim_next(node),
        };

        if claim.is_some() {
            self.store.persist(next.lines())?;
        }
        shared.resource = next;
        Ok(claim)
    }

    fn terminate(&self, shared: &mut Shared) {
        if shared.termination.resource_exhausted {
            return;
        }
        shared.termination.resource_exhausted = true;
        info!(
            claimed = shared.termination.claimed,
            sections = shared.sections,
            "termination decided"
        );
        self.termination_tx.send_replace(true);
        self.emit(SimulationEvent::Terminated {
            claimed: shared.termination.claimed,
        });
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("store", &self.store.describe())
            .field("policy", &self.policy)
            .field("peak_occupancy", &self.peak_occupancy())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_resource::MemoryStore;
    use std::sync::Arc;

    fn coordinator(lines: &[&str], policy: ExhaustionPolicy) -> (Coordinator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::from_lines(lines.iter().copied()));
        (Coordinator::new(store.clone(), policy, 16), store)
    }

    #[test]
    fn test_claim_terminates_and_persists() {
        let (coord, store) = coordinator(&["abc", "anna"], ExhaustionPolicy::SingleShot);
        let termination = coord.subscribe_termination();

        let outcome = coord.critical_section(NodeId(2)).unwrap();

        let SectionOutcome::Claimed(claim) = outcome else {
            panic!("expected a claim, got {:?}", outcome);
        };
        assert_eq!(claim.index, 1);
        assert_eq!(store.snapshot(), vec!["abc", "2 2 2 2 "]);
        assert_eq!(
            coord.termination(),
            TerminationState {
                resource_exhausted: true,
                claimed: true
            }
        );
        assert!(*termination.borrow());
        assert!(matches!(coord.outcome(NodeId(2)), NodeOutcome::Claimed { .. }));
    }

    #[test]
    fn test_first_miss_exhausts_single_shot() {
        let (coord, store) = coordinator(&["abc"], ExhaustionPolicy::SingleShot);

        assert_eq!(coord.critical_section(NodeId(1)).unwrap(), SectionOutcome::NotFound);
        assert!(coord.is_terminated());
        assert!(!coord.termination().claimed);
        assert_eq!(coord.critical_section(NodeId(2)).unwrap(), SectionOutcome::Skipped);
        assert_eq!(store.snapshot(), vec!["abc"]);
        assert_eq!(coord.sections_run(), 2);
    }

    #[test]
    fn test_exhaustive_consumes_line_by_line() {
        let (coord, _store) = coordinator(&["abc", "def", "otto"], ExhaustionPolicy::Exhaustive);

        assert_eq!(coord.critical_section(NodeId(1)).unwrap(), SectionOutcome::NotFound);
        assert!(!coord.is_terminated());
        assert_eq!(coord.critical_section(NodeId(2)).unwrap(), SectionOutcome::NotFound);
        assert!(!coord.is_terminated());
        assert!(matches!(
            coord.critical_section(NodeId(3)).unwrap(),
            SectionOutcome::Claimed(_)
        ));
        assert!(coord.termination().claimed);
        assert_eq!(coord.resource().claimed_by(), Some(NodeId(3)));
    }

    #[test]
    fn test_exhaustive_without_match_ends_at_last_line() {
        let (coord, _store) = coordinator(&["ab", "cd"], ExhaustionPolicy::Exhaustive);

        coord.critical_section(NodeId(1)).unwrap();
        assert!(!coord.is_terminated());
        coord.critical_section(NodeId(1)).unwrap();
        assert!(coord.is_terminated());
        assert!(!coord.termination().claimed);
    }

    #[test]
    fn test_store_failure_is_recorded_but_not_terminal() {
        let (coord, store) = coordinator(&["anna"], ExhaustionPolicy::SingleShot);
        store.fail_loads(true);

        assert!(coord.critical_section(NodeId(1)).is_err());
        assert!(!coord.is_terminated());
        assert!(matches!(coord.outcome(NodeId(1)), NodeOutcome::Failed { .. }));
        assert_eq!(coord.failures(), 1);

        store.fail_loads(false);
        assert!(matches!(
            coord.critical_section(NodeId(2)).unwrap(),
            SectionOutcome::Claimed(_)
        ));
    }

    #[test]
    fn test_failed_persist_leaves_no_claim() {
        let (coord, store) = coordinator(&["anna"], ExhaustionPolicy::SingleShot);
        store.fail_persists(true);

        assert!(coord.critical_section(NodeId(1)).is_err());
        assert!(!coord.resource().is_claimed());
        assert_eq!(store.snapshot(), vec!["anna"]);
    }

    #[test]
    fn test_claim_event_is_broadcast() {
        let (coord, _store) = coordinator(&["wow"], ExhaustionPolicy::SingleShot);
        let mut events = coord.subscribe();

        coord.critical_section(NodeId(1)).unwrap();

        match events.try_recv().unwrap() {
            SimulationEvent::Claimed(claim) => assert_eq!(claim.node, NodeId(1)),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events.try_recv().unwrap(),
            SimulationEvent::Terminated { claimed: true }
        );
    }

    #[test]
    fn test_sequential_sections_never_overlap() {
        let (coord, _store) = coordinator(&["a", "b"], ExhaustionPolicy::Exhaustive);
        coord.critical_section(NodeId(1)).unwrap();
        coord.critical_section(NodeId(2)).unwrap();
        assert_eq!(coord.peak_occupancy(), 1);
    }

    #[test]
    fn test_unsearched_nodes_report_no_match() {
        let (coord, _store) = coordinator(&[], ExhaustionPolicy::SingleShot);
        assert_eq!(coord.outcome(NodeId(5)), NodeOutcome::NoMatch);
    }
}
