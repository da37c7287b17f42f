//! FleetNet Topology
//!
//! The neighbor graph every FleetNet node gossips over.
//!
//! # Invariants
//!
//! - The neighbor relation is symmetric: `a ∈ neighbors(b) ⇔ b ∈ neighbors(a)`.
//! - Dead nodes have no edges and never appear in anyone's neighbor set.
//! - `Alive → Dead` is irreversible.
//!
//! All mutation goes through `&mut Topology`, so an edge insertion or a node
//! removal is observed either completely or not at all.
//!
//! # Generation
//!
//! [`generate`] builds the sparse random graph a simulation starts from: each
//! node links to a random number of distinct peers, and every link is added in
//! both directions.

mod error;
mod graph;
mod node;
pub mod generate;

pub use error::{TopologyError, Result};
pub use graph::Topology;
pub use node::{NodeId, NodeStatus};
pub use generate::{GraphSpec, generate};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_order_by_value() {
        assert!(NodeId(0) < NodeId(1));
        assert_eq!(NodeId(3).min(NodeId(7)), NodeId(3));
    }

    #[test]
    fn fresh_topology_is_symmetric() {
        let topology = Topology::with_nodes(4);
        assert!(topology.is_symmetric());
        assert_eq!(topology.edge_count(), 0);
    }
}
