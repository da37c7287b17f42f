//! Honest node: push gossip plus minimum-id leader election.
//!
//! # Gossip
//!
//! Every `gossip_interval` rounds the node bumps its gossip counter and
//! pushes `Gossip { id, round }` to one random neighbor. Gossip is never
//! forwarded. Receiving it is evidence that the sender is alive.
//!
//! # Election
//!
//! Leader values only ever decrease. A node re-broadcasts a claim only when
//! the claim improved its own leader, and at most once per origin:
//!
//! 1. Claims naming an id nobody registered are rejected.
//! 2. `seen_claims[origin]` keeps the smallest value seen from that origin.
//!    A claim that does not beat it, or whose origin was already adopted
//!    from, is a duplicate and is dropped.
//! 3. A claim smaller than the current leader is adopted and forwarded, with
//!    its origin unchanged, to every neighbor but the one it came from.
//!
//! Each node forwards at most once per origin, so total traffic is bounded by
//! `origins × edges` instead of growing without limit.

use std::collections::BTreeMap;

use fleetnet_topology::{NodeId, NodeStatus};
use tracing::{debug, trace};

use crate::agent::{Agent, RoundContext, StepReport};
use crate::config::ProtocolConfig;
use crate::error::ConsensusError;
use crate::message::{Envelope, Message};

/// Dedup record for one claim origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeenClaim {
    /// Smallest leader value seen from this origin.
    pub best: NodeId,
    /// A claim from this origin has been adopted; later ones are ignored.
    pub adopted: bool,
    /// How many times `best` improved, the first sighting included.
    pub improvements: u32,
    /// How many times a claim from this origin was forwarded.
    pub rebroadcasts: u32,
}

impl SeenClaim {
    fn first(best: NodeId) -> Self {
        Self {
            best,
            adopted: false,
            improvements: 1,
            rebroadcasts: 0,
        }
    }
}

/// Where a node stands in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElectionPhase {
    /// No leader value yet.
    Unelected,
    /// Backing a leader that has not been stable long enough.
    Candidate(NodeId),
    /// Backing a leader held for `stability_rounds` rounds.
    Elected(NodeId),
}

/// Protocol state of one honest node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeState {
    pub id: NodeId,
    pub status: NodeStatus,
    pub current_leader: Option<NodeId>,
    /// Gossip rounds this node has originated.
    pub gossip_round: u64,
    /// Simulation round of the last origination.
    pub last_gossip_round: Option<u64>,
    /// Per-origin dedup table.
    pub seen_claims: BTreeMap<NodeId, SeenClaim>,
    /// Latest gossip round heard from each sender.
    pub heard_from: BTreeMap<NodeId, u64>,
    /// Round the current leader was adopted.
    pub leader_since: u64,
    /// Last round this node was activated.
    pub round: u64,
}

impl NodeState {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            status: NodeStatus::Alive,
            current_leader: None,
            gossip_round: 0,
            last_gossip_round: None,
            seen_claims: BTreeMap::new(),
            heard_from: BTreeMap::new(),
            leader_since: 0,
            round: 0,
        }
    }

    /// Distinct nodes heard from, this node included.
    pub fn evidence(&self) -> usize {
        self.heard_from.len() + 1
    }
}

/// A node running the honest protocol.
#[derive(Debug, Clone)]
pub struct HonestAgent {
    state: NodeState,
    config: ProtocolConfig,
}

impl HonestAgent {
    pub fn new(id: NodeId, config: ProtocolConfig) -> Self {
        Self {
            state: NodeState::new(id),
            config,
        }
    }

    pub fn node_state(&self) -> &NodeState {
        &self.state
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Election phase as of the last activation.
    pub fn phase(&self) -> ElectionPhase {
        match self.state.current_leader {
            None => ElectionPhase::Unelected,
            Some(leader) => {
                let held = self.state.round.saturating_sub(self.state.leader_since);
                if held >= self.config.stability_rounds {
                    ElectionPhase::Elected(leader)
                } else {
                    ElectionPhase::Candidate(leader)
                }
            }
        }
    }

    fn quorum_met(&self) -> bool {
        self.state.evidence() >= self.config.nomination_quorum
    }

    /// Back ourselves and announce it to every neighbor, once.
    fn nominate(&mut self, ctx: &mut RoundContext<'_>) {
        let id = self.state.id;
        self.state.current_leader = Some(id);
        self.state.leader_since = ctx.round();
        self.state.seen_claims.insert(
            id,
            SeenClaim {
                adopted: true,
                ..SeenClaim::first(id)
            },
        );
        let sent = ctx.broadcast(Message::LeaderClaim { origin: id, leader: id }, None);
        debug!(node = %id, round = ctx.round(), sent, "nominated self");
    }

    fn on_gossip(&mut self, from: NodeId, round: u64) {
        if from == self.state.id {
            return;
        }
        let latest = self.state.heard_from.entry(from).or_insert(round);
        *latest = (*latest).max(round);
    }

    fn on_claim(
        &mut self,
        from: NodeId,
        origin: NodeId,
        leader: NodeId,
        ctx: &mut RoundContext<'_>,
        report: &mut StepReport,
    ) {
        let id = self.state.id;
        if !ctx.is_known(leader) {
            report.errors.push(ConsensusError::UnknownNode(leader));
            return;
        }

        if let Some(seen) = self.state.seen_claims.get(&origin) {
            if seen.adopted || leader >= seen.best {
                trace!(node = %id, %origin, %leader, "duplicate claim dropped");
                report.suppressed += 1;
                return;
            }
        }
        let seen = self
            .state
            .seen_claims
            .entry(origin)
            .and_modify(|seen| {
                seen.best = leader;
                seen.improvements += 1;
            })
            .or_insert(SeenClaim::first(leader));

        match self.state.current_leader {
            Some(current) if leader >= current => {
                report.suppressed += 1;
            }
            None if leader > id => {
                // A larger claim means the network is live; offer ourselves instead.
                self.nominate(ctx);
            }
            _ => {
                seen.adopted = true;
                seen.rebroadcasts += 1;
                self.state.current_leader = Some(leader);
                self.state.leader_since = ctx.round();
                let forwarded = ctx.broadcast(Message::LeaderClaim { origin, leader }, Some(from));
                report.rebroadcasts += forwarded;
                debug!(node = %id, %leader, %origin, %from, forwarded, "adopted leader");
            }
        }
    }

    fn maybe_gossip(&mut self, ctx: &mut RoundContext<'_>) {
        let interval = self.config.gossip_interval.max(1);
        let due = self
            .state
            .last_gossip_round
            .map_or(true, |last| ctx.round().saturating_sub(last) >= interval);
        if !due {
            return;
        }
        if let Some(peer) = ctx.random_neighbor() {
            self.state.gossip_round += 1;
            self.state.last_gossip_round = Some(ctx.round());
            ctx.send(
                peer,
                Message::Gossip {
                    origin: self.state.id,
                    round: self.state.gossip_round,
                },
            );
        }
    }
}

impl Agent for HonestAgent {
    fn id(&self) -> NodeId {
        self.state.id
    }

    fn status(&self) -> NodeStatus {
        self.state.status
    }

    fn current_leader(&self) -> Option<NodeId> {
        self.state.current_leader
    }

    fn state(&self) -> Option<&NodeState> {
        Some(&self.state)
    }

    fn bootstrap(&mut self, ctx: &mut RoundContext<'_>) -> StepReport {
        let mut report = StepReport::default();
        if self.state.status.is_alive() && self.state.current_leader.is_none() && self.quorum_met() {
            self.nominate(ctx);
            report.leader_changed = true;
        }
        report
    }

    fn step(&mut self, inbox: Vec<Envelope>, ctx: &mut RoundContext<'_>) -> StepReport {
        let mut report = StepReport::default();
        if !self.state.status.is_alive() {
            return report;
        }
        self.state.round = ctx.round();
        let before = self.state.current_leader;

        for Envelope { from, message } in inbox {
            match message {
                Message::Gossip { round, .. } => self.on_gossip(from, round),
                Message::LeaderClaim { origin, leader } => {
                    self.on_claim(from, origin, leader, ctx, &mut report)
                }
            }
        }

        if self.state.current_leader.is_none() && self.quorum_met() {
            self.nominate(ctx);
        }
        self.maybe_gossip(ctx);

        report.leader_changed = before != self.state.current_leader;
        report
    }

    fn die(&mut self) {
        self.state.status = NodeStatus::Dead;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const KNOWN: [NodeId; 6] = [NodeId(0), NodeId(1), NodeId(2), NodeId(3), NodeId(4), NodeId(5)];

    fn claim(origin: u64, leader: u64, from: u64) -> Envelope {
        Envelope::new(
            NodeId(from),
            Message::LeaderClaim { origin: NodeId(origin), leader: NodeId(leader) },
        )
    }

    /// Run one activation of `agent` with the given neighbors and inbox.
    fn step(
        agent: &mut HonestAgent,
        round: u64,
        neighbors: &[u64],
        inbox: Vec<Envelope>,
    ) -> (StepReport, Vec<(NodeId, Message)>) {
        let neighbors: BTreeSet<NodeId> = neighbors.iter().copied().map(NodeId).collect();
        let mut rng = StdRng::seed_from_u64(round);
        let mut ctx = RoundContext::new(round, &neighbors, &KNOWN, &mut rng);
        let report = agent.step(inbox, &mut ctx);
        (report, ctx.into_outbox())
    }

    fn claims(outbox: &[(NodeId, Message)]) -> Vec<(NodeId, Message)> {
        outbox.iter().copied().filter(|(_, m)| m.is_claim()).collect()
    }

    #[test]
    fn bootstrap_nominates_self_to_all_neighbors() {
        let mut agent = HonestAgent::new(NodeId(3), ProtocolConfig::default());
        let neighbors: BTreeSet<NodeId> = [NodeId(2), NodeId(4)].into();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = RoundContext::new(0, &neighbors, &KNOWN, &mut rng);

        let report = agent.bootstrap(&mut ctx);
        assert!(report.leader_changed);
        assert_eq!(agent.current_leader(), Some(NodeId(3)));
        assert_eq!(ctx.outbox().len(), 2);
        assert_eq!(agent.phase(), ElectionPhase::Candidate(NodeId(3)));
    }

    #[test]
    fn quorum_delays_nomination() {
        let config = ProtocolConfig::default().with_nomination_quorum(2);
        let mut agent = HonestAgent::new(NodeId(3), config);
        let neighbors: BTreeSet<NodeId> = [NodeId(4)].into();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = RoundContext::new(0, &neighbors, &KNOWN, &mut rng);
        assert!(!agent.bootstrap(&mut ctx).leader_changed);

        let (report, _) = step(&mut agent, 1, &[4], vec![]);
        assert!(!report.leader_changed);
        assert_eq!(agent.phase(), ElectionPhase::Unelected);

        let gossip = Envelope::new(NodeId(4), Message::Gossip { origin: NodeId(4), round: 1 });
        let (report, _) = step(&mut agent, 2, &[4], vec![gossip]);
        assert!(report.leader_changed);
        assert_eq!(agent.current_leader(), Some(NodeId(3)));
    }

    #[test]
    fn improving_claim_is_adopted_and_forwarded_except_to_sender() {
        let mut agent = HonestAgent::new(NodeId(3), ProtocolConfig::default());
        step(&mut agent, 1, &[1, 2, 4], vec![]);
        assert_eq!(agent.current_leader(), Some(NodeId(3)));

        let (report, outbox) = step(&mut agent, 2, &[1, 2, 4], vec![claim(1, 1, 2)]);
        assert!(report.leader_changed);
        assert_eq!(report.rebroadcasts, 2);
        assert_eq!(agent.current_leader(), Some(NodeId(1)));

        let targets: Vec<_> = claims(&outbox).into_iter().map(|(to, _)| to).collect();
        assert_eq!(targets, vec![NodeId(1), NodeId(4)]);
        for (_, m) in claims(&outbox) {
            assert_eq!(m, Message::LeaderClaim { origin: NodeId(1), leader: NodeId(1) });
        }
    }

    #[test]
    fn duplicate_claim_is_not_forwarded() {
        let mut agent = HonestAgent::new(NodeId(3), ProtocolConfig::default());
        step(&mut agent, 1, &[1, 2], vec![claim(0, 0, 1)]);

        let (report, outbox) = step(&mut agent, 2, &[1, 2], vec![claim(0, 0, 2)]);
        assert_eq!(report.suppressed, 1);
        assert!(claims(&outbox).is_empty());
    }

    #[test]
    fn non_improving_claim_is_recorded_not_forwarded() {
        let mut agent = HonestAgent::new(NodeId(1), ProtocolConfig::default());
        step(&mut agent, 1, &[2], vec![]);

        let (report, outbox) = step(&mut agent, 2, &[2], vec![claim(4, 4, 2)]);
        assert!(!report.leader_changed);
        assert!(claims(&outbox).is_empty());
        assert_eq!(agent.node_state().seen_claims[&NodeId(4)].best, NodeId(4));
        assert!(!agent.node_state().seen_claims[&NodeId(4)].adopted);
    }

    #[test]
    fn one_adoption_per_origin() {
        let mut agent = HonestAgent::new(NodeId(5), ProtocolConfig::default());
        step(&mut agent, 1, &[4], vec![]);

        // Origin 4 keeps lowering its claim.
        step(&mut agent, 2, &[4], vec![claim(4, 3, 4)]);
        let (report, _) = step(&mut agent, 3, &[4], vec![claim(4, 1, 4), claim(4, 0, 4)]);

        assert_eq!(agent.current_leader(), Some(NodeId(3)));
        assert_eq!(report.suppressed, 2);
        let seen = agent.node_state().seen_claims[&NodeId(4)];
        assert!(seen.rebroadcasts <= seen.improvements);
        assert_eq!(seen.rebroadcasts, 1);
    }

    #[test]
    fn larger_claim_triggers_self_nomination_when_unelected() {
        let config = ProtocolConfig::default().with_nomination_quorum(10);
        let mut agent = HonestAgent::new(NodeId(1), config);

        let (report, outbox) = step(&mut agent, 1, &[4, 5], vec![claim(4, 4, 4)]);
        assert!(report.leader_changed);
        assert_eq!(agent.current_leader(), Some(NodeId(1)));
        let nominations: Vec<_> = claims(&outbox)
            .into_iter()
            .filter(|(_, m)| *m == Message::LeaderClaim { origin: NodeId(1), leader: NodeId(1) })
            .collect();
        assert_eq!(nominations.len(), 2);
    }

    #[test]
    fn smaller_claim_is_adopted_when_unelected() {
        let config = ProtocolConfig::default().with_nomination_quorum(10);
        let mut agent = HonestAgent::new(NodeId(4), config);

        step(&mut agent, 1, &[2, 5], vec![claim(2, 2, 2)]);
        assert_eq!(agent.current_leader(), Some(NodeId(2)));
    }

    #[test]
    fn unknown_leader_is_a_local_error() {
        let mut agent = HonestAgent::new(NodeId(3), ProtocolConfig::default());
        let (report, outbox) = step(&mut agent, 1, &[2], vec![claim(2, 99, 2)]);

        assert_eq!(report.errors, vec![ConsensusError::UnknownNode(NodeId(99))]);
        assert!(!agent.node_state().seen_claims.contains_key(&NodeId(2)));
        // The round still runs: nomination and gossip go out.
        assert!(!outbox.is_empty());
    }

    #[test]
    fn own_claim_echo_is_ignored() {
        let mut agent = HonestAgent::new(NodeId(0), ProtocolConfig::default());
        step(&mut agent, 1, &[1, 2], vec![]);

        let (report, outbox) = step(&mut agent, 2, &[1, 2], vec![claim(0, 0, 2)]);
        assert_eq!(report.suppressed, 1);
        assert!(claims(&outbox).is_empty());
    }

    #[test]
    fn gossip_goes_to_one_neighbor_per_interval() {
        let config = ProtocolConfig::default().with_gossip_interval(2);
        let mut agent = HonestAgent::new(NodeId(0), config);

        let gossips = |outbox: &[(NodeId, Message)]| {
            outbox.iter().filter(|(_, m)| !m.is_claim()).count()
        };

        let (_, out) = step(&mut agent, 1, &[1, 2, 3], vec![]);
        assert_eq!(gossips(&out), 1);
        let (_, out) = step(&mut agent, 2, &[1, 2, 3], vec![]);
        assert_eq!(gossips(&out), 0);
        let (_, out) = step(&mut agent, 3, &[1, 2, 3], vec![]);
        assert_eq!(gossips(&out), 1);
        assert_eq!(agent.node_state().gossip_round, 2);
    }

    #[test]
    fn isolated_node_does_not_gossip() {
        let mut agent = HonestAgent::new(NodeId(0), ProtocolConfig::default());
        let (_, out) = step(&mut agent, 1, &[], vec![]);
        assert!(out.is_empty());
        assert_eq!(agent.node_state().gossip_round, 0);
        assert_eq!(agent.node_state().last_gossip_round, None);
    }

    #[test]
    fn gossip_records_sender_as_evidence() {
        let mut agent = HonestAgent::new(NodeId(0), ProtocolConfig::default());
        let inbox = vec![
            Envelope::new(NodeId(2), Message::Gossip { origin: NodeId(2), round: 3 }),
            Envelope::new(NodeId(2), Message::Gossip { origin: NodeId(2), round: 1 }),
            Envelope::new(NodeId(4), Message::Gossip { origin: NodeId(4), round: 1 }),
        ];
        step(&mut agent, 1, &[2, 4], inbox);

        assert_eq!(agent.node_state().heard_from[&NodeId(2)], 3);
        assert_eq!(agent.node_state().evidence(), 3);
    }

    #[test]
    fn phase_becomes_elected_after_stability_window() {
        let config = ProtocolConfig::default().with_stability_rounds(2);
        let mut agent = HonestAgent::new(NodeId(2), config);

        step(&mut agent, 1, &[3], vec![]);
        assert_eq!(agent.phase(), ElectionPhase::Candidate(NodeId(2)));
        step(&mut agent, 3, &[3], vec![]);
        assert_eq!(agent.phase(), ElectionPhase::Elected(NodeId(2)));

        // A better value resets the window.
        step(&mut agent, 4, &[3], vec![claim(1, 1, 3)]);
        assert_eq!(agent.phase(), ElectionPhase::Candidate(NodeId(1)));
    }

    #[test]
    fn dead_agent_ignores_everything() {
        let mut agent = HonestAgent::new(NodeId(2), ProtocolConfig::default());
        agent.die();

        let (report, outbox) = step(&mut agent, 1, &[1], vec![claim(0, 0, 1)]);
        assert_eq!(report, StepReport::default());
        assert!(outbox.is_empty());
        assert_eq!(agent.current_leader(), None);
        assert_eq!(agent.status(), NodeStatus::Dead);
    }
}
