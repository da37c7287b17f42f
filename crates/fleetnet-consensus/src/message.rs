//! Protocol messages.

use fleetnet_topology::NodeId;

/// A protocol message. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum Message {
    /// Liveness advertisement: `origin` has started its `round`-th gossip.
    Gossip { origin: NodeId, round: u64 },

    /// Candidate leader value, tagged with the node that first claimed it.
    ///
    /// `origin` is payload, not transport: a Byzantine sender can forge it.
    LeaderClaim { origin: NodeId, leader: NodeId },
}

impl Message {
    /// The origin named in the payload.
    pub fn origin(&self) -> NodeId {
        match self {
            Message::Gossip { origin, .. } => *origin,
            Message::LeaderClaim { origin, .. } => *origin,
        }
    }

    pub fn is_claim(&self) -> bool {
        matches!(self, Message::LeaderClaim { .. })
    }
}

/// A message in transit, stamped with the node that actually sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    pub from: NodeId,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: NodeId, message: Message) -> Self {
        Self { from, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_comes_from_payload() {
        let claim = Message::LeaderClaim { origin: NodeId(4), leader: NodeId(1) };
        let envelope = Envelope::new(NodeId(9), claim);

        assert_eq!(envelope.message.origin(), NodeId(4));
        assert_eq!(envelope.from, NodeId(9));
        assert!(claim.is_claim());
        assert!(!Message::Gossip { origin: NodeId(2), round: 1 }.is_claim());
    }
}
