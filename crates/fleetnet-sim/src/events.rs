//! Simulation events for the run timeline.

use fleetnet_consensus::ByzantineStrategy;
use fleetnet_topology::NodeId;
use serde::{Deserialize, Serialize};

/// Events that occur during a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    /// The Byzantine set was fixed before the first round
    ByzantineMarked {
        nodes: Vec<NodeId>,
        strategy: ByzantineStrategy,
        round: u64,
    },

    /// A node died and lost all its edges
    NodeDied {
        node: NodeId,
        neighbors_lost: usize,
        round: u64,
    },

    /// A round finished
    RoundCompleted {
        messages_sent: usize,
        messages_dropped: usize,
        leaders_changed: usize,
        errors: usize,
        round: u64,
    },

    /// An honest node switched to a different leader
    LeaderChanged {
        node: NodeId,
        from: Option<NodeId>,
        to: Option<NodeId>,
        round: u64,
    },

    /// Every live honest node backed the same leader for the stability window
    Converged {
        leader: NodeId,
        round: u64,
    },
}

impl SimEvent {
    /// Get the round this event happened in.
    pub fn round(&self) -> u64 {
        match self {
            SimEvent::ByzantineMarked { round, .. } => *round,
            SimEvent::NodeDied { round, .. } => *round,
            SimEvent::RoundCompleted { round, .. } => *round,
            SimEvent::LeaderChanged { round, .. } => *round,
            SimEvent::Converged { round, .. } => *round,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = SimEvent::Converged { leader: NodeId(0), round: 4 };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Converged");
        assert_eq!(json["leader"], 0);
        assert_eq!(event.round(), 4);
    }

    #[test]
    fn leader_change_keeps_both_sides() {
        let event = SimEvent::LeaderChanged {
            node: NodeId(3),
            from: Some(NodeId(3)),
            to: Some(NodeId(1)),
            round: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
