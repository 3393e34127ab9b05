use crate::errors::WaypointError;
use crate::path_network::graph::{Edge, EdgeId, Graph, NodeId};
use crate::topology::geometry::GeometryService;
use crate::topology::serializer::EdgeLayers;
use geo::{Closest, ClosestPoint, Distance, Euclidean};
use geo_types::{Coord, LineString, Point};
use tracing::trace;

/// A stop along a route, placed somewhere on a trail-path edge.
///
/// `position` is the fraction along the edge geometry (0.0 at
/// `nodes_id[0]`, 1.0 at `nodes_id[1]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointOnEdge {
    pub edge: Option<EdgeId>,
    /// Where the waypoint sits on the edge geometry.
    pub coordinate: Coord<f64>,
    /// The coordinate the user actually picked before snapping, if known.
    pub original: Option<Coord<f64>>,
    pub position: Option<f64>,
    pub edge_length: f64,
}

impl PointOnEdge {
    pub fn new(edge: EdgeId, coordinate: Coord<f64>, position: f64, edge_length: f64) -> Self {
        Self {
            edge: Some(edge),
            coordinate,
            original: None,
            position: Some(position),
            edge_length,
        }
    }

    /// Snap a picked coordinate onto the geometry of `edge`.
    pub fn snap<G: GeometryService>(
        edge: &Edge,
        polyline: &LineString<f64>,
        picked: Coord<f64>,
        geometry: &G,
    ) -> Self {
        let position = geometry.locate_on_line(polyline, picked);
        Self {
            edge: Some(edge.id),
            coordinate: geometry.interpolate(polyline, position),
            original: Some(picked),
            position: Some(position),
            edge_length: edge.length,
        }
    }

    /// Snap a picked coordinate onto the closest trail section that has a
    /// geometry, however far away it is. Ties go to the lowest edge id.
    pub fn snap_nearest<L: EdgeLayers, G: GeometryService>(
        graph: &Graph,
        layers: &L,
        picked: Coord<f64>,
        geometry: &G,
    ) -> Option<Self> {
        let point = Point::from(picked);
        let mut closest: Option<(f64, &Edge, &LineString<f64>)> = None;

        for edge_id in graph.edge_ids() {
            let (Some(edge), Some(polyline)) = (graph.edge(edge_id), layers.polyline(edge_id)) else {
                continue;
            };
            let distance = match polyline.closest_point(&point) {
                Closest::Intersection(on_line) | Closest::SinglePoint(on_line) => {
                    Euclidean.distance(point, on_line)
                }
                Closest::Indeterminate => continue,
            };
            if closest.is_none_or(|(best, _, _)| distance < best) {
                closest = Some((distance, edge, polyline));
            }
        }

        let (distance, edge, polyline) = closest?;
        trace!("Closest edge to {:?} is {} ({:.6} away)", picked, edge.id, distance);
        Some(Self::snap(edge, polyline, picked, geometry))
    }

    pub fn is_valid(&self) -> bool {
        self.edge.is_some() && self.position.is_some()
    }

    pub fn checked_edge_and_position(&self) -> Result<(EdgeId, f64), WaypointError> {
        let edge = self.edge.ok_or(WaypointError::MissingEdge)?;
        let position = self.position.ok_or(WaypointError::MissingPosition(edge))?;
        Ok((edge, position))
    }
}

/// Record of one waypoint spliced into the graph. Handing it back to
/// [`Graph::restore`] removes exactly what [`Graph::split_at`] added.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a split must be restored, otherwise the graph keeps the transient node"]
pub struct GraphSplit {
    pub new_node_id: NodeId,
    pub new_edges: [Edge; 2],
    pub dist_start_point: f64,
    pub dist_end_point: f64,
    pub initial_edge: Edge,
}

impl GraphSplit {
    pub fn owns_edge(&self, id: EdgeId) -> bool {
        self.new_edges.iter().any(|edge| edge.id == id)
    }
}

impl Graph {
    /// Break the waypoint's edge in two by adding a transient node at its
    /// position. The original edge stays in the graph untouched.
    pub fn split_at(&mut self, waypoint: &PointOnEdge) -> Result<GraphSplit, WaypointError> {
        let (edge_id, position) = waypoint.checked_edge_and_position()?;
        let initial_edge = *self
            .edge(edge_id)
            .ok_or(WaypointError::UnknownEdge(edge_id))?;

        let dist_start_point = position * waypoint.edge_length;
        let dist_end_point = (1.0 - position) * waypoint.edge_length;

        let new_node_id = self.next_transient_id();
        let first = Edge {
            id: self.next_transient_id(),
            length: dist_start_point,
            nodes_id: [initial_edge.first_node(), new_node_id],
        };
        let second = Edge {
            id: self.next_transient_id(),
            length: dist_end_point,
            nodes_id: [new_node_id, initial_edge.last_node()],
        };

        self.add_node(new_node_id);
        self.add_edge(first);
        self.add_edge(second);

        trace!(
            "Split edge {} at {:.3} with transient node {}",
            edge_id,
            position,
            new_node_id
        );

        Ok(GraphSplit {
            new_node_id,
            new_edges: [first, second],
            dist_start_point,
            dist_end_point,
            initial_edge,
        })
    }

    /// Undo a [`Graph::split_at`]. Consumes the record so it cannot be
    /// applied twice.
    pub fn restore(&mut self, split: GraphSplit) {
        for edge in &split.new_edges {
            self.remove_edge(edge.id);
        }
        self.remove_node(split.new_node_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_network::graph::GraphData;
    use crate::topology::geometry::PlanarGeometry;
    use geo_types::line_string;
    use std::collections::BTreeMap;

    fn two_node_graph() -> Graph {
        let mut data = GraphData::default();
        data.nodes.insert(1, BTreeMap::from([(2, 10)]));
        data.nodes.insert(2, BTreeMap::from([(1, 10)]));
        data.edges.insert(
            10,
            Edge {
                id: 10,
                length: 100.0,
                nodes_id: [1, 2],
            },
        );
        Graph::from_data(data, 1000).expect("valid graph")
    }

    fn waypoint(edge: EdgeId, position: f64) -> PointOnEdge {
        PointOnEdge::new(edge, Coord { x: 0.0, y: 0.0 }, position, 100.0)
    }

    #[test]
    fn test_split_links_both_endpoints_to_new_node() {
        let mut graph = two_node_graph();
        let split = graph.split_at(&waypoint(10, 0.25)).expect("valid waypoint");

        assert_eq!(split.new_node_id, 1000);
        assert_eq!(split.new_edges[0].id, 1001);
        assert_eq!(split.new_edges[1].id, 1002);
        assert_eq!(split.dist_start_point, 25.0);
        assert_eq!(split.dist_end_point, 75.0);

        assert_eq!(graph.edge_between(1, 1000).map(|e| e.id), Some(1001));
        assert_eq!(graph.edge_between(1000, 2).map(|e| e.id), Some(1002));
        // the original edge is still routable
        assert_eq!(graph.edge_between(1, 2).map(|e| e.id), Some(10));

        graph.restore(split);
    }

    #[test]
    fn test_restore_returns_graph_to_previous_state() {
        let mut graph = two_node_graph();
        let before = graph.to_data();

        let split = graph.split_at(&waypoint(10, 0.6)).expect("valid waypoint");
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        graph.restore(split);

        assert_eq!(graph.to_data(), before);
    }

    #[test]
    fn test_invalid_waypoint_leaves_graph_untouched() {
        let mut graph = two_node_graph();
        let before = graph.to_data();

        let mut missing_position = waypoint(10, 0.5);
        missing_position.position = None;
        assert!(!missing_position.is_valid());
        assert_eq!(
            graph.split_at(&missing_position).unwrap_err(),
            WaypointError::MissingPosition(10)
        );

        let mut missing_edge = waypoint(10, 0.5);
        missing_edge.edge = None;
        assert_eq!(
            graph.split_at(&missing_edge).unwrap_err(),
            WaypointError::MissingEdge
        );

        assert_eq!(
            graph.split_at(&waypoint(77, 0.5)).unwrap_err(),
            WaypointError::UnknownEdge(77)
        );

        assert_eq!(graph.to_data(), before);
        assert_eq!(graph.transient_ids().current(), 1000);
    }

    #[test]
    fn test_split_of_self_loop_is_reversible() {
        let mut data = GraphData::default();
        data.nodes.insert(1, BTreeMap::from([(1, 5)]));
        data.edges.insert(
            5,
            Edge {
                id: 5,
                length: 40.0,
                nodes_id: [1, 1],
            },
        );
        let mut graph = Graph::from_data(data, 1000).expect("valid graph");
        let before = graph.to_data();

        let split = graph
            .split_at(&PointOnEdge::new(5, Coord { x: 0.0, y: 0.0 }, 0.75, 40.0))
            .expect("valid waypoint");
        // both halves join the same pair, the shorter one carries the link
        assert_eq!(graph.edge_between(1, split.new_node_id).map(|e| e.length), Some(10.0));

        graph.restore(split);
        assert_eq!(graph.to_data(), before);
    }

    // 3: (0,0) -> (10,0), 7: (0,2) -> (10,2)
    fn parallel_sections() -> (Graph, BTreeMap<EdgeId, LineString<f64>>) {
        let mut graph = Graph::default();
        graph.add_edge(Edge {
            id: 7,
            length: 10.0,
            nodes_id: [3, 4],
        });
        graph.add_edge(Edge {
            id: 3,
            length: 10.0,
            nodes_id: [1, 2],
        });
        let layers = BTreeMap::from([
            (3, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
            (7, line_string![(x: 0.0, y: 2.0), (x: 10.0, y: 2.0)]),
        ]);
        (graph, layers)
    }

    #[test]
    fn test_snap_nearest_picks_closest_section() {
        let (graph, layers) = parallel_sections();
        let geometry = PlanarGeometry::default();

        let waypoint = PointOnEdge::snap_nearest(&graph, &layers, Coord { x: 4.0, y: 1.6 }, &geometry)
            .expect("sections with geometry");
        assert_eq!(waypoint.edge, Some(7));
        assert!((waypoint.position.unwrap_or(-1.0) - 0.4).abs() < 1e-9);
        assert!(geometry.same_point(waypoint.coordinate, Coord { x: 4.0, y: 2.0 }));
        assert_eq!(waypoint.original, Some(Coord { x: 4.0, y: 1.6 }));
        assert_eq!(waypoint.edge_length, 10.0);
    }

    #[test]
    fn test_snap_nearest_tie_goes_to_lowest_edge_id() {
        let (graph, layers) = parallel_sections();
        let geometry = PlanarGeometry::default();

        let waypoint = PointOnEdge::snap_nearest(&graph, &layers, Coord { x: 5.0, y: 1.0 }, &geometry)
            .expect("sections with geometry");
        assert_eq!(waypoint.edge, Some(3));
        assert!((waypoint.position.unwrap_or(-1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_snap_nearest_far_away_still_snaps() {
        let (graph, layers) = parallel_sections();
        let geometry = PlanarGeometry::default();

        let picked = Coord { x: 500.0, y: 1000.0 };
        let waypoint = PointOnEdge::snap_nearest(&graph, &layers, picked, &geometry)
            .expect("sections with geometry");
        assert_eq!(waypoint.edge, Some(7));
        assert!((waypoint.position.unwrap_or(-1.0) - 1.0).abs() < 1e-9);
        assert!(geometry.same_point(waypoint.coordinate, Coord { x: 10.0, y: 2.0 }));
        assert_eq!(waypoint.original, Some(picked));
    }

    #[test]
    fn test_snap_nearest_without_geometry_is_none() {
        let (graph, _) = parallel_sections();
        let layers: BTreeMap<EdgeId, LineString<f64>> = BTreeMap::new();
        let geometry = PlanarGeometry::default();

        assert!(
            PointOnEdge::snap_nearest(&graph, &layers, Coord { x: 1.0, y: 1.0 }, &geometry).is_none()
        );
    }
}
