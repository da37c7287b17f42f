//! Error types for fleetnet-consensus.

use fleetnet_topology::{NodeId, TopologyError};
use thiserror::Error;

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Errors raised by the channel, agents and scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// The underlying topology rejected an operation.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A message or operation referenced a node that was never registered.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// An operation targeted a dead node's protocol state.
    #[error("node {0} is dead")]
    DeadNode(NodeId),

    /// The Byzantine set is too large for the tolerance bound.
    #[error("{byzantine} byzantine nodes out of {total} breaks the n/3 bound")]
    InvalidByzantineFraction { byzantine: usize, total: usize },

    /// Configuration was attempted after the first round.
    #[error("simulation already started")]
    AlreadyStarted,
}
