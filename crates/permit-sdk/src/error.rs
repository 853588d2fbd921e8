//! Error types for the Permit SDK.

use permit_core::NodeId;
use permit_resource::ResourceError;
use thiserror::Error;

/// Error type for SDK operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Rejected configuration or command line value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store could not be used.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// A message was addressed to a node outside the cluster.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// An actor task ended without returning its report.
    #[error("Actor for node {node} stopped abnormally: {reason}")]
    ActorAborted { node: NodeId, reason: String },
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SimError>;
