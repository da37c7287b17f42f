//! FleetNet Consensus
//!
//! Nodes agree on a single leader by gossiping over a sparse graph. There is
//! no coordinator: every node only ever talks to its direct neighbors.
//!
//! # Minimum-id election
//!
//! Every node starts by nominating itself. A claim for a smaller id beats the
//! current one, so leader values only ever decrease and a connected network
//! settles on its smallest live id after at most `diameter` rounds.
//!
//! # Bounded traffic
//!
//! A node forwards a claim only when it improved its own leader, and at most
//! once per claim origin. A Byzantine node can lie about leaders and forge
//! origins, but cannot make honest nodes re-broadcast without bound.
//!
//! # Byzantine tolerance
//!
//! With `f` Byzantine nodes out of `n`, runs require `3·f < n`:
//! - 4 nodes → 1 faulty
//! - 10 nodes → 3 faulty
//! - 100 nodes → 33 faulty
//!
//! # Rounds
//!
//! The [`Scheduler`] activates every live node once per round. Messages sent
//! in round `r` become visible in round `r + 1`.

mod agent;
mod byzantine;
mod channel;
mod config;
mod convergence;
mod error;
mod honest;
mod message;
mod scheduler;
mod threshold;

pub use agent::{Agent, RoundContext, StepReport};
pub use byzantine::{ByzantineAgent, ByzantineSet, ByzantineStrategy};
pub use channel::MessageChannel;
pub use config::ProtocolConfig;
pub use convergence::ConvergenceState;
pub use error::{ConsensusError, Result};
pub use honest::{ElectionPhase, HonestAgent, NodeState, SeenClaim};
pub use message::{Envelope, Message};
pub use scheduler::{NodeError, NodeView, RoundSummary, Scheduler, Snapshot};
pub use threshold::{
    byzantine_count, check_tolerance, max_byzantine, within_tolerance, DEFAULT_BYZANTINE_FRACTION,
};

pub use fleetnet_topology::{NodeId, NodeStatus, Topology};
