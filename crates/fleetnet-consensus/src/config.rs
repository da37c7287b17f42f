//! Protocol tuning shared by every honest agent.

/// Configuration for the gossip and election protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProtocolConfig {
    /// Rounds between two gossip originations by the same node.
    /// Default: 1 (gossip every round).
    pub gossip_interval: u64,

    /// Distinct nodes an agent must have heard from, itself included,
    /// before it nominates itself.
    /// Default: 1 (nominate during bootstrap).
    pub nomination_quorum: usize,

    /// Consecutive rounds a leader value must be held to count as elected.
    pub stability_rounds: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            gossip_interval: 1,
            nomination_quorum: 1,
            stability_rounds: 3,
        }
    }
}

impl ProtocolConfig {
    /// Set the gossip interval. Zero is treated as one.
    #[must_use]
    pub fn with_gossip_interval(mut self, rounds: u64) -> Self {
        self.gossip_interval = rounds.max(1);
        self
    }

    /// Require evidence from `nodes` distinct nodes before self-nomination.
    #[must_use]
    pub fn with_nomination_quorum(mut self, nodes: usize) -> Self {
        self.nomination_quorum = nodes;
        self
    }

    /// Set how long a leader must be held to count as elected.
    #[must_use]
    pub fn with_stability_rounds(mut self, rounds: u64) -> Self {
        self.stability_rounds = rounds;
        self
    }
}
