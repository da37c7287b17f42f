//! Error types for the simulation driver.

use fleetnet_consensus::ConsensusError;
use fleetnet_topology::TopologyError;
use thiserror::Error;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while setting up or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Topology generation or mutation failed
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Protocol setup failed
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
