use crate::path_network::graph::{Edge, EdgeId, Graph, NodeId};
use ahash::{AHashMap, AHashSet};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One traversed edge of a computed route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathComponent {
    pub start: NodeId,
    pub end: NodeId,
    pub edge: Edge,
    pub weight: f64,
    /// Set when `edge` is a transient split edge; the persistent edge it was
    /// cut from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_edge: Option<Edge>,
}

impl PathComponent {
    /// The persistent edge behind this component.
    pub fn resolved_edge(&self) -> &Edge {
        self.real_edge.as_ref().unwrap_or(&self.edge)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPath {
    pub path: Vec<PathComponent>,
    pub weight: f64,
}

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: OrderedFloat<f64>,
    node: NodeId,
}

impl Eq for State {}

// Min-heap on cost. Equal costs pop the higher node id first.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    prev: Option<(NodeId, EdgeId)>,
    weight: f64,
    visited: bool,
}

pub struct PathFinder<'a> {
    graph: &'a Graph,
}

impl<'a> PathFinder<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Label-setting search from any of `from` to the nearest of `to`, using
    /// edge length as weight. `None` when no destination can be reached.
    pub fn shortest_path(&self, from: &[NodeId], to: &[NodeId]) -> Option<WeightedPath> {
        let destinations: AHashSet<NodeId> = to.iter().copied().collect();
        let mut labels: AHashMap<NodeId, Label> = AHashMap::new();
        let mut heap = BinaryHeap::new();

        for &node in from {
            labels.insert(
                node,
                Label {
                    prev: None,
                    weight: 0.0,
                    visited: false,
                },
            );
            heap.push(State {
                cost: OrderedFloat(0.0),
                node,
            });
        }

        let mut reached = None;

        while let Some(State { cost, node }) = heap.pop() {
            let label = match labels.get_mut(&node) {
                Some(label) => label,
                None => continue,
            };
            // Stale heap entry
            if label.visited || cost.0 > label.weight {
                continue;
            }
            label.visited = true;
            let current_weight = label.weight;

            if destinations.contains(&node) {
                reached = Some(node);
                break;
            }

            for (neighbor, edge) in self.graph.neighbors(node) {
                let next_weight = current_weight + edge.length;
                match labels.get_mut(&neighbor) {
                    Some(next) => {
                        if next.visited || next.weight <= next_weight {
                            continue;
                        }
                        next.weight = next_weight;
                        next.prev = Some((node, edge.id));
                    }
                    None => {
                        labels.insert(
                            neighbor,
                            Label {
                                prev: Some((node, edge.id)),
                                weight: next_weight,
                                visited: false,
                            },
                        );
                    }
                }
                heap.push(State {
                    cost: OrderedFloat(next_weight),
                    node: neighbor,
                });
            }
        }

        let destination = reached?;
        let weight = labels[&destination].weight;

        let mut path = Vec::new();
        let mut current = destination;
        while let Some((prev, edge_id)) = labels[&current].prev {
            let edge = *self.graph.edge(edge_id)?;
            path.push(PathComponent {
                start: prev,
                end: current,
                edge,
                weight: edge.length,
                real_edge: None,
            });
            current = prev;
        }
        path.reverse();

        Some(WeightedPath { path, weight })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: EdgeId, length: f64, a: NodeId, b: NodeId) -> Edge {
        Edge {
            id,
            length,
            nodes_id: [a, b],
        }
    }

    //  1 --(1)-- 2 --(1)-- 3
    //   \                 /
    //    \------(5)------/
    fn triangle() -> Graph {
        let mut graph = Graph::default();
        graph.add_edge(edge(12, 1.0, 1, 2));
        graph.add_edge(edge(23, 1.0, 2, 3));
        graph.add_edge(edge(13, 5.0, 1, 3));
        graph
    }

    #[test]
    fn test_prefers_lighter_detour() {
        let graph = triangle();
        let result = PathFinder::new(&graph)
            .shortest_path(&[1], &[3])
            .expect("reachable");

        let edges: Vec<EdgeId> = result.path.iter().map(|c| c.edge.id).collect();
        assert_eq!(edges, vec![12, 23]);
        assert_eq!(result.weight, 2.0);
        assert_eq!(result.path[0].start, 1);
        assert_eq!(result.path[1].end, 3);
    }

    #[test]
    fn test_source_that_is_destination_gives_empty_path() {
        let graph = triangle();
        let result = PathFinder::new(&graph)
            .shortest_path(&[2], &[2])
            .expect("reachable");
        assert!(result.path.is_empty());
        assert_eq!(result.weight, 0.0);
    }

    #[test]
    fn test_multiple_sources_and_destinations() {
        let mut graph = triangle();
        graph.add_edge(edge(34, 10.0, 3, 4));
        let result = PathFinder::new(&graph)
            .shortest_path(&[1, 4], &[3])
            .expect("reachable");
        // 1 -> 2 -> 3 costs 2, 4 -> 3 costs 10
        assert_eq!(result.path.first().map(|c| c.start), Some(1));
        assert_eq!(result.weight, 2.0);
    }

    #[test]
    fn test_unreachable_returns_none() {
        let mut graph = triangle();
        graph.add_edge(edge(89, 1.0, 8, 9));
        assert!(PathFinder::new(&graph).shortest_path(&[1], &[9]).is_none());
    }

    #[test]
    fn test_path_weight_matches_components() {
        let mut graph = triangle();
        graph.add_edge(edge(34, 2.5, 3, 4));
        graph.add_edge(edge(45, 0.25, 4, 5));
        graph.add_edge(edge(15, 9.0, 1, 5));
        let result = PathFinder::new(&graph)
            .shortest_path(&[1], &[5])
            .expect("reachable");

        let sum: f64 = result.path.iter().map(|c| c.weight).sum();
        assert!((sum - result.weight).abs() < 1e-9);
        assert_eq!(result.weight, 4.75);
        for pair in result.path.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
