use crate::path_network::graph::{EdgeId, NodeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {node} references unknown edge {edge}")]
    UnknownEdge { node: NodeId, edge: EdgeId },
    #[error("edge {edge} connects node {node}, which is missing from the node table")]
    MissingEndpoint { edge: EdgeId, node: NodeId },
    #[error("edge {edge} has a negative or non-finite length ({length})")]
    InvalidLength { edge: EdgeId, length: f64 },
}

/// Reasons a waypoint is refused before the graph is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaypointError {
    #[error("waypoint is not attached to any edge")]
    MissingEdge,
    #[error("waypoint on edge {0} has no position")]
    MissingPosition(EdgeId),
    #[error("waypoint references edge {0}, which is not in the graph")]
    UnknownEdge(EdgeId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("a route needs at least two waypoints, got {0}")]
    NotEnoughWaypoints(usize),
    #[error("waypoint {index} is invalid: {source}")]
    InvalidWaypoint {
        index: usize,
        #[source]
        source: WaypointError,
    },
    #[error("no path between waypoint {from} and waypoint {}", .from + 1)]
    Unreachable { from: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("could not compute positions without a polyline for edge {edge} (leg {leg})")]
    MissingPolyline { leg: usize, edge: EdgeId },
}

#[derive(Error, Debug)]
pub enum SectionError {
    #[error("invalid trail sections GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("feature {0} has no numeric `pk` property")]
    MissingId(usize),
    #[error("trail section {0} is not a LineString")]
    NotALineString(EdgeId),
}
