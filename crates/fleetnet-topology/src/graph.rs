//! Symmetric neighbor graph with per-node liveness.
//!
//! Ordered maps keep iteration deterministic, so a seeded simulation replays
//! identically.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::{NodeId, NodeStatus, Result, TopologyError};

/// The neighbor graph plus liveness of every registered node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topology {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    status: BTreeMap<NodeId, NodeStatus>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `count` isolated live nodes with ids `0..count`.
    pub fn with_nodes(count: usize) -> Self {
        let mut topology = Self::new();
        for i in 0..count {
            topology.register(NodeId(i as u64));
        }
        topology
    }

    /// A path `0 - 1 - ... - (count-1)`.
    pub fn line(count: usize) -> Self {
        let mut topology = Self::with_nodes(count);
        for i in 1..count {
            topology.link(NodeId(i as u64 - 1), NodeId(i as u64));
        }
        topology
    }

    /// A cycle over `count` nodes. Fewer than three nodes gives a line.
    pub fn ring(count: usize) -> Self {
        let mut topology = Self::line(count);
        if count > 2 {
            topology.link(NodeId(count as u64 - 1), NodeId(0));
        }
        topology
    }

    /// Every node connected to every other.
    pub fn complete(count: usize) -> Self {
        let mut topology = Self::with_nodes(count);
        for a in 0..count as u64 {
            for b in (a + 1)..count as u64 {
                topology.link(NodeId(a), NodeId(b));
            }
        }
        topology
    }

    // Constructors only link freshly registered live nodes.
    fn link(&mut self, a: NodeId, b: NodeId) {
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Register a live node with no neighbors.
    /// Returns false if the id was already registered.
    pub fn register(&mut self, id: NodeId) -> bool {
        if self.status.contains_key(&id) {
            return false;
        }
        self.status.insert(id, NodeStatus::Alive);
        self.adjacency.insert(id, BTreeSet::new());
        true
    }

    /// Whether the id was ever registered.
    pub fn contains(&self, id: NodeId) -> bool {
        self.status.contains_key(&id)
    }

    /// Liveness of a node.
    pub fn status(&self, id: NodeId) -> Result<NodeStatus> {
        self.status
            .get(&id)
            .copied()
            .ok_or(TopologyError::UnknownNode(id))
    }

    /// Whether a node is registered and alive.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.status.get(&id).is_some_and(NodeStatus::is_alive)
    }

    /// Neighbors of a node. A dead node has none.
    pub fn neighbors(&self, id: NodeId) -> Result<&BTreeSet<NodeId>> {
        self.adjacency
            .get(&id)
            .ok_or(TopologyError::UnknownNode(id))
    }

    /// Number of neighbors of a node.
    pub fn degree(&self, id: NodeId) -> Result<usize> {
        self.neighbors(id).map(BTreeSet::len)
    }

    /// Connect two live nodes in both directions.
    /// Returns true if the edge is new.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        if a == b {
            return Err(TopologyError::SelfLoop(a));
        }
        for id in [a, b] {
            if !self.status(id)?.is_alive() {
                return Err(TopologyError::DeadNode(id));
            }
        }
        let inserted = self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        Ok(inserted)
    }

    /// Disconnect two nodes in both directions.
    /// Returns true if the edge existed.
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        self.status(a)?;
        self.status(b)?;
        let removed = self.adjacency.get_mut(&a).is_some_and(|n| n.remove(&b));
        if let Some(n) = self.adjacency.get_mut(&b) {
            n.remove(&a);
        }
        Ok(removed)
    }

    /// Mark a node dead and detach it from every neighbor.
    ///
    /// Returns the neighbors it had. Removing an already-dead node is a
    /// no-op that returns an empty list.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let status = self
            .status
            .get_mut(&id)
            .ok_or(TopologyError::UnknownNode(id))?;
        if !status.is_alive() {
            return Ok(Vec::new());
        }
        *status = NodeStatus::Dead;

        let former = std::mem::take(self.adjacency.entry(id).or_default());
        for neighbor in &former {
            if let Some(n) = self.adjacency.get_mut(neighbor) {
                n.remove(&id);
            }
        }
        Ok(former.into_iter().collect())
    }

    /// All registered ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.status.keys().copied()
    }

    /// Live ids in ascending order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.status
            .iter()
            .filter(|(_, s)| s.is_alive())
            .map(|(&id, _)| id)
    }

    /// Number of registered nodes (alive or dead).
    pub fn len(&self) -> usize {
        self.status.len()
    }

    /// Check if no node was registered.
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.status.values().filter(|s| s.is_alive()).count()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Check the symmetry invariant and that no edge touches a dead node.
    pub fn is_symmetric(&self) -> bool {
        self.adjacency.iter().all(|(a, neighbors)| {
            neighbors.iter().all(|b| {
                a != b
                    && self.is_alive(*a)
                    && self.is_alive(*b)
                    && self.adjacency.get(b).is_some_and(|back| back.contains(a))
            })
        })
    }

    /// Hop distance from `source` to every live node reachable from it.
    pub fn distances_from(&self, source: NodeId) -> Result<BTreeMap<NodeId, usize>> {
        let mut distances = BTreeMap::new();
        if !self.status(source)?.is_alive() {
            return Ok(distances);
        }

        let mut queue = VecDeque::from([source]);
        distances.insert(source, 0);
        while let Some(current) = queue.pop_front() {
            let next = distances[&current] + 1;
            for &neighbor in self.neighbors(current)? {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, next);
                    queue.push_back(neighbor);
                }
            }
        }
        Ok(distances)
    }

    /// Connected components of the live subgraph, each sorted ascending.
    /// Components are ordered by their smallest member.
    pub fn components(&self) -> Vec<BTreeSet<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for id in self.live_nodes() {
            if seen.contains(&id) {
                continue;
            }
            let component: BTreeSet<NodeId> = self
                .distances_from(id)
                .map(|d| d.into_keys().collect())
                .unwrap_or_default();
            seen.extend(component.iter().copied());
            components.push(component);
        }
        components
    }

    /// Longest shortest path between live nodes.
    ///
    /// `None` when the live subgraph is empty or disconnected.
    pub fn diameter(&self) -> Option<usize> {
        let live = self.live_count();
        if live == 0 {
            return None;
        }
        let mut diameter = 0;
        for id in self.live_nodes() {
            let distances = self.distances_from(id).ok()?;
            if distances.len() != live {
                return None;
            }
            diameter = diameter.max(distances.values().copied().max().unwrap_or(0));
        }
        Some(diameter)
    }
}
