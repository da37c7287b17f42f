//! Seeded simulation runs with event recording.

use std::collections::BTreeMap;

use fleetnet_consensus::{byzantine_count, ByzantineSet, RoundSummary, Scheduler, Snapshot};
use fleetnet_topology::{generate, NodeId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::events::SimEvent;

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Rounds completed
    pub rounds: u64,
    /// Messages accepted by the channel over the whole run
    pub messages_sent: usize,
    /// The leader every live honest node backs, if they agree
    pub agreed_leader: Option<NodeId>,
    /// Rounds since any honest leader last changed
    pub stable_rounds: u64,
    /// First round at which agreement held for the stability window
    pub converged_at: Option<u64>,
    pub snapshot: Snapshot,
}

/// Drives a scheduler from a [`SimulationConfig`] and records events.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    scheduler: Scheduler,
    events: Vec<SimEvent>,
    /// Honest leaders as of the last recorded round
    leaders: BTreeMap<NodeId, Option<NodeId>>,
    messages_sent: usize,
    converged_at: Option<u64>,
}

impl Simulation {
    /// Generate the topology, pick the Byzantine set and build the scheduler.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let topology = generate(&config.graph_spec(), &mut rng)?;
        if let Some(death) = config.deaths.iter().find(|d| !topology.contains(d.node)) {
            return Err(SimError::Config(format!(
                "death scheduled for unknown node {}",
                death.node
            )));
        }
        info!(
            nodes = topology.len(),
            edges = topology.edge_count(),
            diameter = ?topology.diameter(),
            seed = config.seed,
            "generated topology"
        );

        let ids: Vec<NodeId> = topology.node_ids().collect();
        let count = byzantine_count(ids.len(), config.byzantine_fraction);
        let byzantine = ByzantineSet::random(&ids, count, &mut rng)?;

        let scheduler_rng = StdRng::seed_from_u64(rng.gen());
        let mut scheduler = Scheduler::with_rng(topology, config.protocol, scheduler_rng);
        let mut events = Vec::new();
        if !byzantine.is_empty() {
            scheduler.mark_byzantine(byzantine.iter(), config.byzantine_strategy)?;
            events.push(SimEvent::ByzantineMarked {
                nodes: byzantine.iter().collect(),
                strategy: config.byzantine_strategy,
                round: 0,
            });
        }

        Ok(Self {
            config,
            scheduler,
            events,
            leaders: BTreeMap::new(),
            messages_sent: 0,
            converged_at: None,
        })
    }

    /// Apply deaths due before the next round, then run it.
    pub fn step(&mut self) -> Result<RoundSummary> {
        let next = self.scheduler.round() + 1;
        let due: Vec<NodeId> = self
            .config
            .deaths
            .iter()
            .filter(|d| d.round == next)
            .map(|d| d.node)
            .collect();
        for node in due {
            let neighbors_lost = self.scheduler.topology().degree(node).unwrap_or(0);
            if self.scheduler.die(node)? {
                info!(%node, round = next, neighbors_lost, "node died");
                self.events.push(SimEvent::NodeDied {
                    node,
                    neighbors_lost,
                    round: next,
                });
            }
        }

        let summary = self.scheduler.run_round();
        self.messages_sent += summary.messages_sent;
        self.record(&summary);
        Ok(summary)
    }

    /// Run until `config.rounds` rounds have completed.
    pub fn run(&mut self) -> Result<SimulationReport> {
        while self.scheduler.round() < self.config.rounds {
            self.step()?;
        }
        Ok(self.report())
    }

    /// Summarize the run so far.
    pub fn report(&self) -> SimulationReport {
        let snapshot = self.scheduler.snapshot();
        SimulationReport {
            rounds: self.scheduler.round(),
            messages_sent: self.messages_sent,
            agreed_leader: snapshot.agreed_leader(),
            stable_rounds: self.scheduler.convergence().rounds_since_change(),
            converged_at: self.converged_at,
            snapshot,
        }
    }

    fn record(&mut self, summary: &RoundSummary) {
        let round = summary.round;
        let snapshot = self.scheduler.snapshot();
        let leaders = snapshot.leaders();

        for (&node, &to) in &leaders {
            let from = self.leaders.get(&node).copied().flatten();
            if from != to {
                self.events.push(SimEvent::LeaderChanged { node, from, to, round });
            }
        }
        self.leaders = leaders;

        self.events.push(SimEvent::RoundCompleted {
            messages_sent: summary.messages_sent,
            messages_dropped: summary.messages_dropped,
            leaders_changed: summary.leaders_changed,
            errors: summary.errors.len(),
            round,
        });
        debug!(round, sent = summary.messages_sent, "recorded round");

        let window = self.config.protocol.stability_rounds;
        if self.converged_at.is_none() && self.scheduler.convergence().is_stable_for(window) {
            if let Some(leader) = snapshot.agreed_leader() {
                info!(%leader, round, "converged");
                self.converged_at = Some(round);
                self.events.push(SimEvent::Converged { leader, round });
            }
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> Snapshot {
        self.scheduler.snapshot()
    }

    /// Get all recorded events.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn round(&self) -> u64 {
        self.scheduler.round()
    }
}
