//! Simulation configuration.

use std::fs;
use std::path::Path;

use fleetnet_consensus::{ByzantineStrategy, ProtocolConfig, DEFAULT_BYZANTINE_FRACTION};
use fleetnet_topology::{GraphSpec, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// A node scheduled to die before a given round runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDeath {
    pub round: u64,
    pub node: NodeId,
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for topology generation, Byzantine selection and peer choice
    pub seed: u64,
    /// Number of nodes
    pub node_count: usize,
    /// Fewest peers each node picks when the graph is generated
    pub min_neighbors: usize,
    /// Most peers each node picks when the graph is generated
    pub max_neighbors: usize,
    /// Bridge components so the initial graph is connected
    pub connected: bool,
    /// Rounds to run
    pub rounds: u64,
    /// Share of nodes turned Byzantine, capped below a third
    pub byzantine_fraction: f64,
    /// What Byzantine nodes do
    pub byzantine_strategy: ByzantineStrategy,
    /// Nodes to kill, and when
    pub deaths: Vec<ScheduledDeath>,
    /// Honest protocol tuning
    pub protocol: ProtocolConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            node_count: 10,
            min_neighbors: 1,
            max_neighbors: 3,
            connected: true,
            rounds: 50,
            byzantine_fraction: DEFAULT_BYZANTINE_FRACTION,
            byzantine_strategy: ByzantineStrategy::RandomClaims,
            deaths: Vec::new(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could honor.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.byzantine_fraction) {
            return Err(SimError::Config(format!(
                "byzantine_fraction must be within [0, 1], got {}",
                self.byzantine_fraction
            )));
        }
        self.graph_spec().validate()?;
        if let Some(death) = self.deaths.iter().find(|d| d.round == 0) {
            return Err(SimError::Config(format!(
                "death of {} scheduled for round 0; rounds start at 1",
                death.node
            )));
        }
        Ok(())
    }

    /// Graph generation parameters.
    pub fn graph_spec(&self) -> GraphSpec {
        let spec = GraphSpec::new(self.node_count, self.min_neighbors, self.max_neighbors);
        if self.connected {
            spec
        } else {
            spec.allow_disconnected()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_nodes(mut self, count: usize) -> Self {
        self.node_count = count;
        self
    }

    #[must_use]
    pub fn with_neighbors(mut self, min: usize, max: usize) -> Self {
        self.min_neighbors = min;
        self.max_neighbors = max;
        self
    }

    #[must_use]
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_byzantine(mut self, fraction: f64, strategy: ByzantineStrategy) -> Self {
        self.byzantine_fraction = fraction;
        self.byzantine_strategy = strategy;
        self
    }

    /// Kill `node` right before `round` runs.
    #[must_use]
    pub fn with_death(mut self, round: u64, node: NodeId) -> Self {
        self.deaths.push(ScheduledDeath { round, node });
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }
}
