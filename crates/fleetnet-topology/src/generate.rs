//! Seeded random graph generation.
//!
//! Every node picks `k ∈ [min, max]` distinct other nodes and links to each
//! of them in both directions, so a node usually ends up with more than `k`
//! neighbors once the back-links of its peers are counted.
//!
//! Sparse sampling can leave the graph disconnected. With
//! [`GraphSpec::connected`] set, components are bridged afterwards: the
//! smallest node of each component is linked to the smallest node of the
//! component before it.

use rand::seq::index::sample;
use rand::Rng;

use crate::{NodeId, Result, Topology, TopologyError};

/// Parameters for [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphSpec {
    /// Number of nodes, ids `0..node_count`.
    pub node_count: usize,
    /// Fewest peers each node samples.
    pub min_neighbors: usize,
    /// Most peers each node samples. Clamped to `node_count - 1`.
    pub max_neighbors: usize,
    /// Bridge components so the result is connected.
    pub connected: bool,
}

impl Default for GraphSpec {
    fn default() -> Self {
        Self {
            node_count: 10,
            min_neighbors: 1,
            max_neighbors: 3,
            connected: true,
        }
    }
}

impl GraphSpec {
    /// A spec for `node_count` nodes sampling `min..=max` peers each.
    pub fn new(node_count: usize, min_neighbors: usize, max_neighbors: usize) -> Self {
        Self {
            node_count,
            min_neighbors,
            max_neighbors,
            connected: true,
        }
    }

    /// Allow the generated graph to stay disconnected.
    #[must_use]
    pub fn allow_disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Check the spec and return the effective `(min, max)` sample range.
    pub fn validate(&self) -> Result<(usize, usize)> {
        if self.node_count == 0 {
            return Err(TopologyError::EmptyTopology);
        }
        let others = self.node_count - 1;
        if self.min_neighbors > self.max_neighbors || self.min_neighbors > others {
            return Err(TopologyError::InvalidNeighborRange {
                min: self.min_neighbors,
                max: self.max_neighbors,
                nodes: self.node_count,
            });
        }
        Ok((self.min_neighbors, self.max_neighbors.min(others)))
    }
}

/// Build a random topology from `spec` using `rng`.
pub fn generate<R: Rng + ?Sized>(spec: &GraphSpec, rng: &mut R) -> Result<Topology> {
    let (min, max) = spec.validate()?;
    let mut topology = Topology::with_nodes(spec.node_count);
    let others = spec.node_count - 1;

    for i in 0..spec.node_count {
        let id = NodeId(i as u64);
        let k = rng.gen_range(min..=max);
        // Sample among the other nodes: indices past `i` shift up by one.
        for j in sample(rng, others, k) {
            let peer = if j >= i { j + 1 } else { j };
            topology.add_edge(id, NodeId(peer as u64))?;
        }
    }

    if spec.connected {
        bridge_components(&mut topology)?;
    }
    Ok(topology)
}

fn bridge_components(topology: &mut Topology) -> Result<()> {
    let anchors: Vec<NodeId> = topology
        .components()
        .iter()
        .filter_map(|c| c.first().copied())
        .collect();
    for pair in anchors.windows(2) {
        topology.add_edge(pair[0], pair[1])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_graph() {
        let mut rng = StdRng::seed_from_u64(1);
        let spec = GraphSpec::new(0, 1, 3);
        assert_eq!(generate(&spec, &mut rng), Err(TopologyError::EmptyTopology));
    }

    #[test]
    fn rejects_inverted_range() {
        let spec = GraphSpec::new(10, 4, 2);
        assert!(matches!(
            spec.validate(),
            Err(TopologyError::InvalidNeighborRange { min: 4, max: 2, nodes: 10 })
        ));
    }

    #[test]
    fn rejects_min_above_available_peers() {
        let spec = GraphSpec::new(3, 3, 5);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn clamps_max_to_available_peers() {
        let spec = GraphSpec::new(4, 1, 10);
        assert_eq!(spec.validate().unwrap(), (1, 3));
    }

    #[test]
    fn single_node_graph() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = generate(&GraphSpec::new(1, 0, 3), &mut rng).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.edge_count(), 0);
        assert_eq!(t.diameter(), Some(0));
    }

    #[test]
    fn same_seed_same_graph() {
        let spec = GraphSpec::default();
        let a = generate(&spec, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = generate(&spec, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_neighbors_without_bridging_stays_isolated() {
        let mut rng = StdRng::seed_from_u64(3);
        let spec = GraphSpec::new(5, 0, 0).allow_disconnected();
        let t = generate(&spec, &mut rng).unwrap();
        assert_eq!(t.edge_count(), 0);
        assert_eq!(t.components().len(), 5);
    }

    #[test]
    fn bridging_connects_isolated_nodes() {
        let mut rng = StdRng::seed_from_u64(3);
        let spec = GraphSpec::new(5, 0, 0);
        let t = generate(&spec, &mut rng).unwrap();
        assert_eq!(t.components().len(), 1);
        assert_eq!(t.diameter(), Some(4));
    }

    proptest! {
        #[test]
        fn generated_graphs_hold_invariants(
            seed in any::<u64>(),
            nodes in 1usize..40,
            min in 0usize..3,
            extra in 0usize..4,
        ) {
            let spec = GraphSpec::new(nodes, min.min(nodes - 1), min + extra);
            let t = generate(&spec, &mut StdRng::seed_from_u64(seed)).unwrap();

            prop_assert!(t.is_symmetric());
            prop_assert_eq!(t.len(), nodes);
            prop_assert_eq!(t.components().len(), 1);
            for id in t.live_nodes() {
                prop_assert!(t.degree(id).unwrap() >= spec.min_neighbors);
            }
        }
    }
}
