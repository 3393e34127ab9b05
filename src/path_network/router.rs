use crate::errors::RouteError;
use crate::path_network::dijkstra::{PathFinder, WeightedPath};
use crate::path_network::graph::{Edge, EdgeId, Graph};
use crate::path_network::waypoint::{GraphSplit, PointOnEdge};
use itertools::Itertools;
use tracing::debug;

/// Shortest path between two consecutive waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    #[serde(flatten)]
    pub path: WeightedPath,
    pub from_waypoint: PointOnEdge,
    pub to_waypoint: PointOnEdge,
}

impl RouteLeg {
    /// Persistent edges traversed, with immediate repeats collapsed. Passing
    /// through a split point shows up as the same real edge twice in a row.
    pub fn real_edges(&self) -> Vec<Edge> {
        self.path
            .path
            .iter()
            .map(|component| *component.resolved_edge())
            .dedup_by(|a, b| a.id == b.id)
            .collect()
    }

    pub fn real_edge_ids(&self) -> Vec<EdgeId> {
        self.real_edges().iter().map(|edge| edge.id).collect()
    }
}

/// Route through every waypoint in order. Fails as a whole if any leg has
/// no path; the graph is back to its original state either way.
pub fn compute_route(graph: &mut Graph, waypoints: &[PointOnEdge]) -> Result<Vec<RouteLeg>, RouteError> {
    if waypoints.len() < 2 {
        return Err(RouteError::NotEnoughWaypoints(waypoints.len()));
    }

    for (index, waypoint) in waypoints.iter().enumerate() {
        if let Err(source) = waypoint.checked_edge_and_position() {
            return Err(RouteError::InvalidWaypoint { index, source });
        }
    }

    let mut legs = Vec::with_capacity(waypoints.len() - 1);
    for (index, (from, to)) in waypoints.iter().tuple_windows().enumerate() {
        let path = compute_leg(graph, index, from, to)?;
        legs.push(RouteLeg {
            path,
            from_waypoint: *from,
            to_waypoint: *to,
        });
    }

    debug!("Computed route with {} legs", legs.len());
    Ok(legs)
}

fn compute_leg(
    graph: &mut Graph,
    index: usize,
    from: &PointOnEdge,
    to: &PointOnEdge,
) -> Result<WeightedPath, RouteError> {
    let from_split = graph
        .split_at(from)
        .map_err(|source| RouteError::InvalidWaypoint { index, source })?;
    let to_split = match graph.split_at(to) {
        Ok(split) => split,
        Err(source) => {
            graph.restore(from_split);
            return Err(RouteError::InvalidWaypoint {
                index: index + 1,
                source,
            });
        }
    };

    let weighted_path = PathFinder::new(graph)
        .shortest_path(&[from_split.new_node_id], &[to_split.new_node_id]);

    let splits = [from_split, to_split];
    let result = weighted_path.map(|mut weighted_path| {
        annotate_real_edges(&mut weighted_path, &splits);
        weighted_path
    });

    for split in splits {
        graph.restore(split);
    }

    match result {
        Some(weighted_path) => {
            debug!(
                "Leg {} has {} components, weight {:.2}",
                index,
                weighted_path.path.len(),
                weighted_path.weight
            );
            Ok(weighted_path)
        }
        None => {
            debug!("Leg {} has no path", index);
            Err(RouteError::Unreachable { from: index })
        }
    }
}

// Components running over a transient split edge point back at the edge
// it was cut from.
fn annotate_real_edges(weighted_path: &mut WeightedPath, splits: &[GraphSplit]) {
    for component in &mut weighted_path.path {
        if let Some(split) = splits.iter().find(|split| split.owns_edge(component.edge.id)) {
            component.real_edge = Some(split.initial_edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WaypointError;
    use geo_types::Coord;

    fn edge(id: EdgeId, length: f64, a: u64, b: u64) -> Edge {
        Edge {
            id,
            length,
            nodes_id: [a, b],
        }
    }

    fn at(graph: &Graph, edge: EdgeId, position: f64) -> PointOnEdge {
        let length = graph.edge(edge).map(|e| e.length).unwrap_or(0.0);
        PointOnEdge::new(edge, Coord { x: 0.0, y: 0.0 }, position, length)
    }

    // 1 --[10]-- 2 --[20]-- 3 --[30]-- 4
    fn line() -> Graph {
        let mut graph = Graph::default();
        graph.add_edge(edge(10, 100.0, 1, 2));
        graph.add_edge(edge(20, 100.0, 2, 3));
        graph.add_edge(edge(30, 100.0, 3, 4));
        graph
    }

    #[test]
    fn test_route_along_a_line() {
        let mut graph = line();
        let waypoints = [at(&graph, 10, 0.5), at(&graph, 30, 0.5)];
        let legs = compute_route(&mut graph, &waypoints).expect("route");

        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].real_edge_ids(), vec![10, 20, 30]);
        assert_eq!(legs[0].path.weight, 200.0);
        assert!(legs[0].path.path.first().and_then(|c| c.real_edge).is_some());
        assert!(legs[0].path.path.last().and_then(|c| c.real_edge).is_some());
        assert!(legs[0].path.path[1].real_edge.is_none());
    }

    #[test]
    fn test_two_waypoints_on_the_same_edge_collapse_to_one_edge() {
        let mut graph = line();
        let waypoints = [at(&graph, 20, 0.2), at(&graph, 20, 0.7)];
        let legs = compute_route(&mut graph, &waypoints).expect("route");

        assert_eq!(legs[0].real_edge_ids(), vec![20]);
    }

    #[test]
    fn test_not_enough_waypoints() {
        let mut graph = line();
        let waypoints = [at(&graph, 10, 0.5)];
        assert_eq!(
            compute_route(&mut graph, &waypoints).unwrap_err(),
            RouteError::NotEnoughWaypoints(1)
        );
    }

    #[test]
    fn test_invalid_waypoint_is_rejected_before_mutation() {
        let mut graph = line();
        let before = graph.to_data();
        let mut broken = at(&graph, 30, 0.5);
        broken.position = None;
        let waypoints = [at(&graph, 10, 0.5), broken];

        assert_eq!(
            compute_route(&mut graph, &waypoints).unwrap_err(),
            RouteError::InvalidWaypoint {
                index: 1,
                source: WaypointError::MissingPosition(30)
            }
        );
        assert_eq!(graph.to_data(), before);
    }

    #[test]
    fn test_unknown_edge_restores_first_split() {
        let mut graph = line();
        let before = graph.to_data();
        let waypoints = [
            at(&graph, 10, 0.5),
            PointOnEdge::new(99, Coord { x: 0.0, y: 0.0 }, 0.5, 1.0),
        ];

        assert_eq!(
            compute_route(&mut graph, &waypoints).unwrap_err(),
            RouteError::InvalidWaypoint {
                index: 1,
                source: WaypointError::UnknownEdge(99)
            }
        );
        assert_eq!(graph.to_data(), before);
    }
}
