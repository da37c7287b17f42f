//! Round scheduler: drives every live agent once per synchronous round.
//!
//! # Round structure
//!
//! 1. Round 0 (bootstrap, run once before round 1): agents that can already
//!    nominate themselves do so.
//! 2. Rounds 1..: for each live node in ascending id order, drain its inbox,
//!    step its agent, and route the agent's outbox through the channel.
//! 3. Barrier: the channel delivers everything sent during the round.
//!
//! The scheduler is the single writer of topology, channel and agents, so a
//! death is applied between activations and no agent ever observes a
//! half-removed edge.

use std::collections::BTreeMap;

use fleetnet_topology::{NodeId, NodeStatus, Topology};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::agent::{Agent, RoundContext, StepReport};
use crate::byzantine::{ByzantineAgent, ByzantineSet, ByzantineStrategy};
use crate::channel::MessageChannel;
use crate::config::ProtocolConfig;
use crate::convergence::ConvergenceState;
use crate::error::{ConsensusError, Result};
use crate::honest::{HonestAgent, NodeState};
use crate::message::Message;

/// A node-local failure collected during a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub node: NodeId,
    pub error: ConsensusError,
}

/// What happened during one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u64,
    /// Messages accepted by the channel.
    pub messages_sent: usize,
    /// Messages dropped because an endpoint was dead.
    pub messages_dropped: usize,
    /// Agents whose leader value changed.
    pub leaders_changed: usize,
    /// Claims forwarded after an improving adoption.
    pub rebroadcasts: usize,
    pub errors: Vec<NodeError>,
}

impl RoundSummary {
    fn absorb(&mut self, other: RoundSummary) {
        self.messages_sent += other.messages_sent;
        self.messages_dropped += other.messages_dropped;
        self.leaders_changed += other.leaders_changed;
        self.rebroadcasts += other.rebroadcasts;
        self.errors.extend(other.errors);
    }
}

/// Externally visible state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeView {
    pub status: NodeStatus,
    pub current_leader: Option<NodeId>,
    pub byzantine: bool,
}

/// Every node's status and leader at the end of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub round: u64,
    pub nodes: BTreeMap<NodeId, NodeView>,
}

impl Snapshot {
    pub fn get(&self, id: NodeId) -> Option<&NodeView> {
        self.nodes.get(&id)
    }

    /// Leader of every live honest node.
    pub fn leaders(&self) -> BTreeMap<NodeId, Option<NodeId>> {
        self.nodes
            .iter()
            .filter(|(_, v)| v.status.is_alive() && !v.byzantine)
            .map(|(&id, v)| (id, v.current_leader))
            .collect()
    }

    /// The single leader all live honest nodes back, if they agree.
    pub fn agreed_leader(&self) -> Option<NodeId> {
        let mut leaders = self.leaders().into_values();
        let first = leaders.next()??;
        leaders.all(|l| l == Some(first)).then_some(first)
    }
}

/// Drives the gossip and election protocol over a topology.
#[derive(Debug)]
pub struct Scheduler {
    topology: Topology,
    channel: MessageChannel,
    agents: BTreeMap<NodeId, Box<dyn Agent>>,
    byzantine: ByzantineSet,
    config: ProtocolConfig,
    /// Every registered id, ascending.
    known: Vec<NodeId>,
    rng: StdRng,
    round: u64,
    started: bool,
    convergence: ConvergenceState,
}

impl Scheduler {
    /// Create a scheduler running the honest protocol on every node.
    pub fn new(topology: Topology, config: ProtocolConfig, seed: u64) -> Self {
        Self::with_rng(topology, config, StdRng::seed_from_u64(seed))
    }

    /// Create a scheduler drawing randomness from `rng`.
    pub fn with_rng(topology: Topology, config: ProtocolConfig, rng: StdRng) -> Self {
        let known: Vec<NodeId> = topology.node_ids().collect();
        let mut channel = MessageChannel::new();
        let mut agents: BTreeMap<NodeId, Box<dyn Agent>> = BTreeMap::new();

        for &id in &known {
            channel.register(id);
            let mut agent = HonestAgent::new(id, config);
            if !topology.is_alive(id) {
                agent.die();
                // Registered just above.
                let _ = channel.close(id);
            }
            agents.insert(id, Box::new(agent));
        }

        Self {
            topology,
            channel,
            agents,
            byzantine: ByzantineSet::default(),
            config,
            known,
            rng,
            round: 0,
            started: false,
            convergence: ConvergenceState::new(),
        }
    }

    /// Replace the agent of a node with a custom behavior.
    ///
    /// Only allowed before the first round.
    pub fn set_agent(&mut self, agent: Box<dyn Agent>) -> Result<()> {
        if self.started {
            return Err(ConsensusError::AlreadyStarted);
        }
        let id = agent.id();
        let slot = self
            .agents
            .get_mut(&id)
            .ok_or(ConsensusError::UnknownNode(id))?;
        *slot = agent;
        Ok(())
    }

    /// Mark the Byzantine set for this run. Fixed once the first round starts.
    ///
    /// Calling again before the start replaces the previous set.
    pub fn mark_byzantine(
        &mut self,
        ids: impl IntoIterator<Item = NodeId>,
        strategy: ByzantineStrategy,
    ) -> Result<()> {
        if self.started {
            return Err(ConsensusError::AlreadyStarted);
        }
        let ids: Vec<NodeId> = ids.into_iter().collect();
        if let Some(&unknown) = ids.iter().find(|id| !self.topology.contains(**id)) {
            return Err(ConsensusError::UnknownNode(unknown));
        }
        let set = ByzantineSet::new(ids, self.topology.live_count())?;

        for id in self.byzantine.iter() {
            self.agents.insert(id, Box::new(HonestAgent::new(id, self.config)));
        }
        for id in set.iter() {
            self.agents.insert(id, Box::new(ByzantineAgent::new(id, strategy)));
        }
        info!(count = set.len(), ?strategy, "marked byzantine nodes");
        self.byzantine = set;
        Ok(())
    }

    /// Run the bootstrap phase (round 0) if it has not run yet.
    ///
    /// Called automatically by the first [`run_round`](Self::run_round).
    pub fn start(&mut self) -> RoundSummary {
        let mut summary = RoundSummary::default();
        if self.started {
            return summary;
        }
        self.started = true;

        let live: Vec<NodeId> = self.topology.live_nodes().collect();
        for id in live {
            let (report, outbox) = match self.activate(id, |agent, _, ctx| Ok(agent.bootstrap(ctx))) {
                Ok(out) => out,
                Err(error) => {
                    summary.errors.push(NodeError { node: id, error });
                    continue;
                }
            };
            self.route(id, report, outbox, &mut summary);
        }
        self.channel.deliver();
        self.convergence.record(0, summary.leaders_changed);
        debug!(sent = summary.messages_sent, "bootstrap complete");
        summary
    }

    /// Run one synchronous round.
    pub fn run_round(&mut self) -> RoundSummary {
        let bootstrap = self.start();
        let bootstrap_changes = bootstrap.leaders_changed;
        self.round += 1;
        let round = self.round;
        let mut summary = RoundSummary {
            round,
            ..RoundSummary::default()
        };
        summary.absorb(bootstrap);

        let live: Vec<NodeId> = self.topology.live_nodes().collect();
        for id in live {
            let result = self.activate(id, |agent, channel, ctx| {
                let inbox = channel.drain(agent.id())?;
                Ok(agent.step(inbox, ctx))
            });
            let (report, outbox) = match result {
                Ok(out) => out,
                Err(error) => {
                    summary.errors.push(NodeError { node: id, error });
                    continue;
                }
            };
            self.route(id, report, outbox, &mut summary);
        }

        self.channel.deliver();
        // Bootstrap changes were already recorded as round 0.
        self.convergence
            .record(round, summary.leaders_changed - bootstrap_changes);
        for NodeError { node, error } in &summary.errors {
            warn!(round, %node, %error, "node-local error");
        }
        debug!(
            round,
            sent = summary.messages_sent,
            dropped = summary.messages_dropped,
            changed = summary.leaders_changed,
            "round complete"
        );
        summary
    }

    /// Run `rounds` rounds and return their summaries.
    pub fn run(&mut self, rounds: u64) -> Vec<RoundSummary> {
        (0..rounds).map(|_| self.run_round()).collect()
    }

    /// Run until no leader changed for `window` rounds, or `max_rounds`
    /// more rounds have run. Returns the round at which stability was seen.
    pub fn run_until_stable(&mut self, window: u64, max_rounds: u64) -> Option<u64> {
        for _ in 0..max_rounds {
            self.run_round();
            if self.convergence.is_stable_for(window) {
                return Some(self.round);
            }
        }
        None
    }

    /// Kill a node: detach it from the topology, close its channel and stop
    /// its agent. Returns false if it was already dead.
    pub fn die(&mut self, id: NodeId) -> Result<bool> {
        if !self.topology.status(id)?.is_alive() {
            return Ok(false);
        }
        let former = self.topology.remove_node(id)?;
        let dropped = self.channel.close(id)?;
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.die();
        }
        debug!(node = %id, round = self.round, neighbors = former.len(), dropped, "node died");
        Ok(true)
    }

    /// Status and leader of every node.
    pub fn snapshot(&self) -> Snapshot {
        let nodes = self
            .agents
            .iter()
            .map(|(&id, agent)| {
                let view = NodeView {
                    status: self.topology.status(id).unwrap_or(NodeStatus::Dead),
                    current_leader: agent.current_leader(),
                    byzantine: agent.is_byzantine(),
                };
                (id, view)
            })
            .collect();
        Snapshot {
            round: self.round,
            nodes,
        }
    }

    /// Rounds completed so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    pub fn agent(&self, id: NodeId) -> Option<&dyn Agent> {
        self.agents.get(&id).map(|a| a.as_ref())
    }

    /// Protocol state of an honest node.
    pub fn node_state(&self, id: NodeId) -> Option<&NodeState> {
        self.agents.get(&id).and_then(|a| a.state())
    }

    pub fn byzantine_set(&self) -> &ByzantineSet {
        &self.byzantine
    }

    pub fn convergence(&self) -> &ConvergenceState {
        &self.convergence
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Build a context for `id` and hand it to `act` with the agent.
    fn activate<F>(&mut self, id: NodeId, act: F) -> Result<(StepReport, Vec<(NodeId, Message)>)>
    where
        F: FnOnce(&mut dyn Agent, &mut MessageChannel, &mut RoundContext<'_>) -> Result<StepReport>,
    {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or(ConsensusError::UnknownNode(id))?;
        let neighbors = self.topology.neighbors(id)?;
        let mut ctx = RoundContext::new(self.round, neighbors, &self.known, &mut self.rng);
        let report = act(agent.as_mut(), &mut self.channel, &mut ctx)?;
        Ok((report, ctx.into_outbox()))
    }

    fn route(
        &mut self,
        from: NodeId,
        report: StepReport,
        outbox: Vec<(NodeId, Message)>,
        summary: &mut RoundSummary,
    ) {
        for (to, message) in outbox {
            match self.channel.send(from, to, message) {
                Ok(true) => summary.messages_sent += 1,
                Ok(false) => summary.messages_dropped += 1,
                Err(error) => summary.errors.push(NodeError { node: from, error }),
            }
        }
        if report.leader_changed {
            summary.leaders_changed += 1;
        }
        summary.rebroadcasts += report.rebroadcasts;
        summary
            .errors
            .extend(report.errors.into_iter().map(|error| NodeError { node: from, error }));
    }
}
