// This module holds the in-memory trail-path network used by the router.
//
// ARCHITECTURE RECAP:
// 1. GraphData:
//    - The plain serializable form shipped to the client once per session:
//      {nodes: {node_id: {neighbor_id: edge_id}}, edges: {edge_id: {id, length, nodes_id}}}
// 2. Graph:
//    - Owned edge arena keyed by id plus an adjacency table.
//    - Waypoints are spliced in as transient nodes/edges and removed again
//      before the next leg is routed (see waypoint.rs).

use crate::errors::GraphError;
use crate::path_network::id_allocator::TransientIdAllocator;
use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};

pub type NodeId = u64;
pub type EdgeId = u64;

/// One trail-path segment. `nodes_id[0]` is where position 0.0 lies along the
/// segment geometry, `nodes_id[1]` is position 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub length: f64,
    pub nodes_id: [NodeId; 2],
}

impl Edge {
    pub fn first_node(&self) -> NodeId {
        self.nodes_id[0]
    }

    pub fn last_node(&self) -> NodeId {
        self.nodes_id[1]
    }

    pub fn is_self_loop(&self) -> bool {
        self.nodes_id[0] == self.nodes_id[1]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: BTreeMap<NodeId, BTreeMap<NodeId, EdgeId>>,
    pub edges: BTreeMap<EdgeId, Edge>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: AHashMap<NodeId, BTreeMap<NodeId, EdgeId>>,
    edges: AHashMap<EdgeId, Edge>,
    ids: TransientIdAllocator,
}

impl Graph {
    pub fn new(ids: TransientIdAllocator) -> Self {
        Self {
            nodes: AHashMap::new(),
            edges: AHashMap::new(),
            ids,
        }
    }

    /// Load a graph from its serializable form. Transient ids are allocated
    /// from `transient_id_offset`, or above the largest persistent id.
    pub fn from_data(data: GraphData, transient_id_offset: u64) -> Result<Self, GraphError> {
        for edge in data.edges.values() {
            if !edge.length.is_finite() || edge.length < 0.0 {
                return Err(GraphError::InvalidLength {
                    edge: edge.id,
                    length: edge.length,
                });
            }
            for node in edge.nodes_id {
                if !data.nodes.contains_key(&node) {
                    return Err(GraphError::MissingEndpoint {
                        edge: edge.id,
                        node,
                    });
                }
            }
        }

        for (node, neighbors) in &data.nodes {
            for edge in neighbors.values() {
                if !data.edges.contains_key(edge) {
                    return Err(GraphError::UnknownEdge {
                        node: *node,
                        edge: *edge,
                    });
                }
            }
        }

        let max_id = data
            .nodes
            .keys()
            .chain(data.edges.keys())
            .copied()
            .max();

        Ok(Self {
            nodes: data.nodes.into_iter().collect(),
            edges: data.edges.into_iter().collect(),
            ids: TransientIdAllocator::above(transient_id_offset, max_id),
        })
    }

    pub fn to_data(&self) -> GraphData {
        GraphData {
            nodes: self
                .nodes
                .iter()
                .map(|(id, neighbors)| (*id, neighbors.clone()))
                .collect(),
            edges: self.edges.iter().map(|(id, edge)| (*id, *edge)).collect(),
        }
    }

    pub fn add_node(&mut self, id: NodeId) {
        self.nodes.entry(id).or_default();
    }

    /// Drop a node and every adjacency entry pointing at it.
    pub fn remove_node(&mut self, id: NodeId) {
        if let Some(neighbors) = self.nodes.remove(&id) {
            for neighbor in neighbors.keys() {
                if let Some(adjacent) = self.nodes.get_mut(neighbor) {
                    adjacent.remove(&id);
                }
            }
        }
    }

    /// Insert an edge and link both endpoints. If the pair is already linked by
    /// a shorter edge that link is kept.
    pub fn add_edge(&mut self, edge: Edge) {
        let [a, b] = edge.nodes_id;
        self.edges.insert(edge.id, edge);
        self.link(a, b, edge.id, edge.length);
        self.link(b, a, edge.id, edge.length);
    }

    fn link(&mut self, from: NodeId, to: NodeId, edge_id: EdgeId, length: f64) {
        let existing = self
            .nodes
            .get(&from)
            .and_then(|neighbors| neighbors.get(&to))
            .and_then(|id| self.edges.get(id))
            .filter(|existing| existing.id != edge_id)
            .map(|existing| existing.length);

        if let Some(existing_length) = existing {
            if existing_length <= length {
                return;
            }
        }
        self.nodes.entry(from).or_default().insert(to, edge_id);
    }

    /// Remove an edge and the adjacency entries that route through it.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        let [a, b] = edge.nodes_id;
        for (from, to) in [(a, b), (b, a)] {
            if let Some(neighbors) = self.nodes.get_mut(&from) {
                if neighbors.get(&to) == Some(&id) {
                    neighbors.remove(&to);
                }
            }
        }
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Neighbours of `id` in ascending node order, with the connecting edge.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Edge)> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter())
            .filter_map(|(neighbor, edge_id)| {
                self.edges.get(edge_id).map(|edge| (*neighbor, edge))
            })
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.nodes
            .get(&a)
            .and_then(|neighbors| neighbors.get(&b))
            .and_then(|edge_id| self.edges.get(edge_id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn edge_ids(&self) -> BTreeSet<EdgeId> {
        self.edges.keys().copied().collect()
    }

    pub(crate) fn next_transient_id(&mut self) -> u64 {
        self.ids.next()
    }

    pub fn transient_ids(&self) -> &TransientIdAllocator {
        &self.ids
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(TransientIdAllocator::default())
    }
}
