//! Byzantine behavior: strategies a faulty minority runs instead of the
//! honest protocol.
//!
//! Byzantine agents drain their inbox every round so queues stay bounded,
//! but keep no protocol state and back no leader.

use std::collections::BTreeSet;

use fleetnet_topology::{NodeId, NodeStatus};
use rand::seq::index::sample;
use rand::Rng;
use tracing::trace;

use crate::agent::{Agent, RoundContext, StepReport};
use crate::error::Result;
use crate::message::{Envelope, Message};
use crate::threshold::check_tolerance;

/// What a Byzantine node does each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByzantineStrategy {
    /// Claim a random known id, under our own origin, to one random neighbor.
    #[default]
    RandomClaims,
    /// Like `RandomClaims`, with the origin forged as a random known id too.
    SpoofedOrigins,
    /// Swallow everything and never send.
    Silent,
}

/// A node running a [`ByzantineStrategy`].
#[derive(Debug, Clone)]
pub struct ByzantineAgent {
    id: NodeId,
    strategy: ByzantineStrategy,
    status: NodeStatus,
    claims_sent: u64,
}

impl ByzantineAgent {
    pub fn new(id: NodeId, strategy: ByzantineStrategy) -> Self {
        Self {
            id,
            strategy,
            status: NodeStatus::Alive,
            claims_sent: 0,
        }
    }

    pub fn strategy(&self) -> ByzantineStrategy {
        self.strategy
    }

    /// Forged claims injected so far.
    pub fn claims_sent(&self) -> u64 {
        self.claims_sent
    }
}

impl Agent for ByzantineAgent {
    fn id(&self) -> NodeId {
        self.id
    }

    fn status(&self) -> NodeStatus {
        self.status
    }

    fn is_byzantine(&self) -> bool {
        true
    }

    fn current_leader(&self) -> Option<NodeId> {
        None
    }

    fn step(&mut self, inbox: Vec<Envelope>, ctx: &mut RoundContext<'_>) -> StepReport {
        drop(inbox);
        if !self.status.is_alive() {
            return StepReport::default();
        }

        let origin = match self.strategy {
            ByzantineStrategy::Silent => return StepReport::default(),
            ByzantineStrategy::RandomClaims => Some(self.id),
            ByzantineStrategy::SpoofedOrigins => ctx.random_known(),
        };
        let (Some(origin), Some(to), Some(leader)) =
            (origin, ctx.random_neighbor(), ctx.random_known())
        else {
            return StepReport::default();
        };

        ctx.send(to, Message::LeaderClaim { origin, leader });
        self.claims_sent += 1;
        trace!(node = %self.id, %to, %origin, %leader, "forged claim");
        StepReport::default()
    }

    fn die(&mut self) {
        self.status = NodeStatus::Dead;
    }
}

/// The nodes marked Byzantine for a run. Always below a third of the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByzantineSet {
    members: BTreeSet<NodeId>,
}

impl ByzantineSet {
    /// Build a set, failing if it breaks the `3·f < n` bound for `total` nodes.
    pub fn new(members: impl IntoIterator<Item = NodeId>, total: usize) -> Result<Self> {
        let members: BTreeSet<NodeId> = members.into_iter().collect();
        check_tolerance(members.len(), total)?;
        Ok(Self { members })
    }

    /// Pick `count` members uniformly from `candidates`.
    pub fn random<R: Rng + ?Sized>(candidates: &[NodeId], count: usize, rng: &mut R) -> Result<Self> {
        let count = count.min(candidates.len());
        let members = sample(rng, candidates.len(), count)
            .into_iter()
            .map(|i| candidates[i]);
        Self::new(members, candidates.len())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied()
    }
}
