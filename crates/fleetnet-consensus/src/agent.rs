//! The interface every node behavior implements.
//!
//! Agents never touch the topology or the channel directly. Each activation
//! gets a [`RoundContext`] holding a read-only view of the node's neighbors,
//! the set of known ids, the simulation RNG, and an outbox. The scheduler
//! routes the outbox through the channel once the agent returns.

use std::collections::BTreeSet;
use std::fmt;

use fleetnet_topology::{NodeId, NodeStatus};
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};

use crate::error::ConsensusError;
use crate::honest::NodeState;
use crate::message::{Envelope, Message};

/// Per-activation view handed to an agent.
#[derive(Debug)]
pub struct RoundContext<'a> {
    round: u64,
    neighbors: &'a BTreeSet<NodeId>,
    known: &'a [NodeId],
    rng: &'a mut StdRng,
    outbox: Vec<(NodeId, Message)>,
}

impl<'a> RoundContext<'a> {
    /// `known` must be sorted ascending.
    pub fn new(
        round: u64,
        neighbors: &'a BTreeSet<NodeId>,
        known: &'a [NodeId],
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            round,
            neighbors,
            known,
            rng,
            outbox: Vec::new(),
        }
    }

    /// Current round. Bootstrap is round 0.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn neighbors(&self) -> &BTreeSet<NodeId> {
        self.neighbors
    }

    /// Every id registered in the simulation, ascending.
    pub fn known_ids(&self) -> &[NodeId] {
        self.known
    }

    pub fn is_known(&self, id: NodeId) -> bool {
        self.known.binary_search(&id).is_ok()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut *self.rng
    }

    /// A neighbor chosen uniformly at random.
    pub fn random_neighbor(&mut self) -> Option<NodeId> {
        self.neighbors.iter().copied().choose(&mut *self.rng)
    }

    /// Any known id chosen uniformly at random.
    pub fn random_known(&mut self) -> Option<NodeId> {
        self.known.choose(&mut *self.rng).copied()
    }

    /// Queue a message for one node.
    pub fn send(&mut self, to: NodeId, message: Message) {
        self.outbox.push((to, message));
    }

    /// Queue a message for every neighbor except `except`.
    /// Returns how many sends were queued.
    pub fn broadcast(&mut self, message: Message, except: Option<NodeId>) -> usize {
        let before = self.outbox.len();
        for &neighbor in self.neighbors {
            if Some(neighbor) != except {
                self.outbox.push((neighbor, message));
            }
        }
        self.outbox.len() - before
    }

    pub fn outbox(&self) -> &[(NodeId, Message)] {
        &self.outbox
    }

    pub fn into_outbox(self) -> Vec<(NodeId, Message)> {
        self.outbox
    }
}

/// What one activation of an agent did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// The agent's leader value differs from before the activation.
    pub leader_changed: bool,
    /// Claims forwarded after an improving adoption.
    pub rebroadcasts: usize,
    /// Claims dropped as duplicates or non-improving.
    pub suppressed: usize,
    /// Node-local problems; never abort the round.
    pub errors: Vec<ConsensusError>,
}

/// A node behavior driven once per round by the scheduler.
pub trait Agent: fmt::Debug + Send {
    fn id(&self) -> NodeId;

    fn status(&self) -> NodeStatus;

    /// Whether this agent runs an adversarial strategy.
    fn is_byzantine(&self) -> bool {
        false
    }

    /// The leader this agent currently backs, if any.
    fn current_leader(&self) -> Option<NodeId>;

    /// Honest protocol state, for inspection.
    fn state(&self) -> Option<&NodeState> {
        None
    }

    /// Round 0: act before any message has been exchanged.
    fn bootstrap(&mut self, _ctx: &mut RoundContext<'_>) -> StepReport {
        StepReport::default()
    }

    /// Process the drained inbox and queue this round's sends.
    fn step(&mut self, inbox: Vec<Envelope>, ctx: &mut RoundContext<'_>) -> StepReport;

    /// Irreversibly stop this agent.
    fn die(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ids(raw: &[u64]) -> BTreeSet<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn broadcast_skips_the_excluded_neighbor() {
        let neighbors = ids(&[1, 2, 3]);
        let known = [NodeId(0), NodeId(1), NodeId(2), NodeId(3)];
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = RoundContext::new(1, &neighbors, &known, &mut rng);

        let claim = Message::LeaderClaim { origin: NodeId(0), leader: NodeId(0) };
        assert_eq!(ctx.broadcast(claim, Some(NodeId(2))), 2);

        let targets: Vec<_> = ctx.into_outbox().into_iter().map(|(to, _)| to).collect();
        assert_eq!(targets, vec![NodeId(1), NodeId(3)]);
    }

    #[test]
    fn random_picks_stay_in_range() {
        let neighbors = ids(&[4, 5]);
        let known = [NodeId(0), NodeId(4), NodeId(5)];
        let mut rng = StdRng::seed_from_u64(9);
        let mut ctx = RoundContext::new(1, &neighbors, &known, &mut rng);

        for _ in 0..20 {
            let n = ctx.random_neighbor().unwrap();
            assert!(neighbors.contains(&n));
            let k = ctx.random_known().unwrap();
            assert!(ctx.is_known(k));
        }
    }

    #[test]
    fn isolated_node_has_no_random_neighbor() {
        let neighbors = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = RoundContext::new(1, &neighbors, &[], &mut rng);
        assert_eq!(ctx.random_neighbor(), None);
        assert_eq!(ctx.random_known(), None);
        assert!(!ctx.is_known(NodeId(0)));
    }
}
