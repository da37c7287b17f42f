//! Error types for fleetnet-topology.

use thiserror::Error;

use crate::NodeId;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors that can occur while building or mutating a topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The node was never registered.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node is dead and cannot take part in the operation.
    #[error("node {0} is dead")]
    DeadNode(NodeId),

    /// An edge from a node to itself was requested.
    #[error("node {0} cannot neighbor itself")]
    SelfLoop(NodeId),

    /// A graph with no nodes was requested.
    #[error("topology needs at least one node")]
    EmptyTopology,

    /// The requested neighbor count range cannot be satisfied.
    #[error("invalid neighbor range {min}..={max} for {nodes} nodes")]
    InvalidNeighborRange {
        min: usize,
        max: usize,
        nodes: usize,
    },
}
