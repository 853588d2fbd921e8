//! Permit SDK - run a Ricart–Agrawala cluster over a shared resource
//!
//! Each node is an actor on its own tokio task. Nodes exchange `Request` and
//! `Reply` messages through a router, and a node enters the critical section
//! only after every peer has granted permission. Inside the section the node
//! searches the shared lines for a palindrome and claims the first one it
//! finds.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use permit_resource::FileStore;
//! use permit_sdk::{Simulation, SimulationConfigBuilder};
//!
//! # async fn demo() -> permit_sdk::Result<()> {
//! let config = SimulationConfigBuilder::new().node_count(4).shape(10, 20).build();
//! let report = Simulation::new(config, FileStore::new("lines.txt"))?
//!     .run()
//!     .await?;
//!
//! if let Some(claim) = &report.claim {
//!     println!("node {} claimed line {}", claim.node, claim.index);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`] - Simulation configuration and exhaustion policies
//! - [`router`] - Mailboxes and message routing, including departure
//! - [`actor`] - The per-node async loop
//! - [`coordinator`] - Shared state, critical section and termination
//! - [`simulation`] - Spawning a cluster and building the report
//! - [`event`] - Progress events
//! - [`error`] - Error types

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod router;
pub mod simulation;

// Re-exports for convenience
pub use actor::{ActorStats, NodeActor};
pub use config::{ExhaustionPolicy, SimulationConfig, SimulationConfigBuilder};
pub use coordinator::{Coordinator, NodeOutcome, SectionOutcome, TerminationState};
pub use error::{Result, SimError};
pub use event::SimulationEvent;
pub use router::{Delivery, Envelope, Mailbox, MemoryRouter, MessageRouter};
pub use simulation::{NodeReport, Simulation, SimulationReport};

// Re-export commonly used types from the lower crates
pub use permit_core::{Message, NodeId};
pub use permit_resource::{Claim, FileStore, LineStore, MemoryStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ExhaustionPolicy, SimulationConfig, SimulationConfigBuilder};
    pub use crate::error::SimError;
    pub use crate::event::SimulationEvent;
    pub use crate::simulation::{Simulation, SimulationReport};
    pub use permit_core::NodeId;
    pub use permit_resource::{FileStore, LineStore, MemoryStore};
}
