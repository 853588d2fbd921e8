//! Events emitted while a simulation runs.

use permit_core::NodeId;
use permit_resource::Claim;
use serde::{Deserialize, Serialize};

/// Progress notifications, broadcast to every subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEvent {
    /// A node broadcast a request.
    Requested { node: NodeId, timestamp: u64 },
    /// A node collected every reply and entered its critical section.
    Entered { node: NodeId },
    /// A node claimed a line. Reported at claim time.
    Claimed(Claim),
    /// A node searched and found nothing.
    NotFound { node: NodeId },
    /// Global termination was decided.
    Terminated { claimed: bool },
    /// A node could not access the backing store and left the run.
    Failed { node: NodeId, error: String },
    /// A node reached Done.
    Finished { node: NodeId },
}
