// Turns computed route legs into the serialized topology stored with a trail:
// for every leg, the ordered list of traversed trail sections and the
// [start, end] fraction covered on each of them.

use crate::errors::TopologyError;
use crate::path_network::graph::EdgeId;
use crate::path_network::router::RouteLeg;
use crate::topology::events::{TrailEvent, events_from_topology};
use crate::topology::geometry::GeometryService;
use ahash::AHashSet;
use geo_types::{Coord, LineString};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use tracing::{debug, error, warn};

/// Travelling more than this fraction of a closed loop means the other way
/// round through its extremities is shorter.
const LOOP_SHORTCUT_THRESHOLD: f64 = 0.5;

pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTopology {
    /// Reserved for drawing parallel paths side by side.
    pub offset: f64,
    /// Keyed by index into `paths`.
    pub positions: BTreeMap<usize, Position>,
    pub paths: Vec<EdgeId>,
}

impl SubTopology {
    fn empty(offset: f64) -> Self {
        Self {
            offset,
            positions: BTreeMap::new(),
            paths: Vec::new(),
        }
    }
}

/// Source of trail-section geometries, usually the layers drawn on the map.
pub trait EdgeLayers {
    fn polyline(&self, edge: EdgeId) -> Option<&LineString<f64>>;
}

impl<S: BuildHasher> EdgeLayers for HashMap<EdgeId, LineString<f64>, S> {
    fn polyline(&self, edge: EdgeId) -> Option<&LineString<f64>> {
        self.get(&edge)
    }
}

impl EdgeLayers for BTreeMap<EdgeId, LineString<f64>> {
    fn polyline(&self, edge: EdgeId) -> Option<&LineString<f64>> {
        self.get(&edge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanShape {
    SingleEdge,
    /// Leaves an edge, takes one other edge, comes back onto the first one.
    ThreeEdgeLoop,
    GeneralSpan,
}

impl SpanShape {
    fn of(paths: &[EdgeId]) -> Self {
        match paths {
            [_] => SpanShape::SingleEdge,
            [first, _, last] if first == last => SpanShape::ThreeEdgeLoop,
            _ => SpanShape::GeneralSpan,
        }
    }
}

#[derive(Clone, Copy)]
struct Layer<'a> {
    line: &'a LineString<f64>,
    first: Coord<f64>,
    last: Coord<f64>,
}

struct Assignment {
    paths: Vec<EdgeId>,
    positions: Vec<Position>,
    cleanup: bool,
}

pub struct TopologyBuilder<'a, L, G> {
    layers: &'a L,
    geometry: &'a G,
    offset: f64,
}

impl<'a, L: EdgeLayers, G: GeometryService> TopologyBuilder<'a, L, G> {
    pub fn new(layers: &'a L, geometry: &'a G, offset: f64) -> Self {
        Self {
            layers,
            geometry,
            offset,
        }
    }

    /// Serialize one leg. `paths` must already have adjacent duplicates
    /// collapsed; `start` and `end` are the leg's waypoint coordinates.
    pub fn sub_topology(
        &self,
        leg: usize,
        paths: &[EdgeId],
        start: Coord<f64>,
        end: Coord<f64>,
    ) -> Result<SubTopology, TopologyError> {
        if paths.is_empty() {
            warn!("Empty topology for leg {}. Expect problems.", leg);
            return Ok(SubTopology::empty(self.offset));
        }

        let layers = paths
            .iter()
            .map(|&edge| self.layer(edge))
            .collect::<Option<Vec<_>>>();
        let layers = match layers {
            Some(layers) => layers,
            None => {
                let edge = paths
                    .iter()
                    .copied()
                    .find(|&edge| self.layer(edge).is_none())
                    .unwrap_or(paths[0]);
                error!("Could not compute distances without polylines (edge {}).", edge);
                return Err(TopologyError::MissingPolyline { leg, edge });
            }
        };

        let first = layers[0];
        let last = layers[layers.len() - 1];
        let pk_start = self.geometry.locate_on_line(first.line, start);
        let pk_end = self.geometry.locate_on_line(last.line, end);
        debug!("Start on layer {} {} {:?}", paths[0], pk_start, start);
        debug!("End on layer {} {} {:?}", paths[paths.len() - 1], pk_end, end);

        let assignment = match SpanShape::of(paths) {
            SpanShape::SingleEdge => self.single_edge(paths[0], first, pk_start, pk_end),
            SpanShape::ThreeEdgeLoop => self.three_edge_loop(paths, &layers, pk_start, pk_end),
            SpanShape::GeneralSpan => self.general_span(paths, &layers, pk_start, pk_end),
        };

        let (paths, positions) = if assignment.cleanup {
            clean_up(assignment.paths, assignment.positions)
        } else {
            (assignment.paths, assignment.positions)
        };

        if paths.is_empty() {
            warn!(
                "Empty topology for leg {} (positions {:?}). Expect problems.",
                leg, positions
            );
        }

        Ok(SubTopology {
            offset: self.offset,
            positions: positions.into_iter().enumerate().collect(),
            paths,
        })
    }

    fn layer(&self, edge: EdgeId) -> Option<Layer<'a>> {
        let line = self.layers.polyline(edge)?;
        Some(Layer {
            line,
            first: *line.0.first()?,
            last: *line.0.last()?,
        })
    }

    fn single_edge(&self, path: EdgeId, layer: Layer<'_>, pk_start: f64, pk_end: f64) -> Assignment {
        let is_loop = self.geometry.is_loop(layer.line);

        if is_loop && (pk_end - pk_start).abs() > LOOP_SHORTCUT_THRESHOLD {
            // Going through the loop's extremities is shorter than the
            // inner way round, so the same edge is used twice.
            let positions = if pk_end - pk_start > LOOP_SHORTCUT_THRESHOLD {
                vec![[pk_start, 0.0], [1.0, pk_end]]
            } else {
                vec![[pk_end, 0.0], [1.0, pk_start]]
            };
            Assignment {
                paths: vec![path, path],
                positions,
                cleanup: false,
            }
        } else {
            Assignment {
                paths: vec![path],
                positions: vec![[pk_start, pk_end]],
                cleanup: !is_loop,
            }
        }
    }

    fn three_edge_loop(
        &self,
        paths: &[EdgeId],
        layers: &[Layer<'_>],
        pk_start: f64,
        pk_end: f64,
    ) -> Assignment {
        let starts_together = self.geometry.same_point(layers[0].first, layers[1].first);
        let positions = if pk_start < pk_end {
            let middle = if starts_together { [0.0, 1.0] } else { [1.0, 0.0] };
            vec![[pk_start, 0.0], middle, [1.0, pk_end]]
        } else {
            let middle = if starts_together { [1.0, 0.0] } else { [0.0, 1.0] };
            vec![[pk_start, 1.0], middle, [0.0, pk_end]]
        };
        Assignment {
            paths: paths.to_vec(),
            positions,
            cleanup: false,
        }
    }

    fn general_span(
        &self,
        paths: &[EdgeId],
        layers: &[Layer<'_>],
        pk_start: f64,
        pk_end: f64,
    ) -> Assignment {
        let count = layers.len();
        let mut positions = Vec::with_capacity(count);

        // First portion
        let start = layers[0];
        let start_on_loop = self.geometry.same_point(start.first, start.last);
        if self.geometry.starts_at_extremity(start.line, layers[1].line) {
            let next = layers[1];
            let share_end = self.geometry.same_point(start.last, next.last);
            let two_paths_loop = self.geometry.same_point(start.last, next.first);
            if (start_on_loop && pk_start > 0.5)
                || (share_end && pk_start + pk_end >= 1.0)
                || (two_paths_loop && pk_start - pk_end > 0.0)
            {
                positions.push([pk_start, 1.0]);
            } else {
                positions.push([pk_start, 0.0]);
            }
        } else {
            positions.push([pk_start, 1.0]);
        }

        // Intermediary sections are always covered entirely
        for i in 1..count - 1 {
            if self
                .geometry
                .starts_at_extremity(layers[i].line, layers[i - 1].line)
            {
                positions.push([0.0, 1.0]);
            } else {
                positions.push([1.0, 0.0]);
            }
        }

        // Last portion
        let end = layers[count - 1];
        let previous = layers[count - 2];
        let end_on_loop = self.geometry.same_point(end.first, end.last);
        if self.geometry.starts_at_extremity(end.line, previous.line) {
            let share_end = self.geometry.same_point(end.last, previous.last);
            let two_paths_loop = self.geometry.same_point(end.last, previous.first);
            if (end_on_loop && pk_end > 0.5)
                || (share_end && pk_start + pk_end >= 1.0)
                || (two_paths_loop && pk_start - pk_end <= 0.0)
            {
                positions.push([1.0, pk_end]);
            } else {
                positions.push([0.0, pk_end]);
            }
        } else {
            positions.push([1.0, pk_end]);
        }

        Assignment {
            paths: paths.to_vec(),
            positions,
            cleanup: true,
        }
    }

    /// Concatenated geometry covered by a sub-topology, for highlighting.
    pub fn highlight(&self, topology: &SubTopology) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for (i, &path) in topology.paths.iter().enumerate() {
            let Some(position) = topology.positions.get(&i) else {
                warn!("Topology problem: {} not in {:?}", i, topology.positions);
                continue;
            };
            let Some(polyline) = self.layers.polyline(path) else {
                warn!("Topology problem: no polyline for edge {}", path);
                continue;
            };
            let points = self.geometry.extract(polyline, position[0], position[1]);
            for point in points {
                if coords
                    .last()
                    .is_some_and(|last| self.geometry.same_point(*last, point))
                {
                    continue;
                }
                coords.push(point);
            }
        }
        LineString::new(coords)
    }

    /// Serialize every leg of a route. Stops at the first leg that cannot be
    /// serialized; the caller must not render a partial topology.
    pub fn build(&self, legs: &[RouteLeg]) -> Result<Topology, TopologyError> {
        debug!("Topology has {} sub-topologies.", legs.len());

        let mut serialized = Vec::with_capacity(legs.len());
        let mut highlights = Vec::with_capacity(legs.len());
        for (step_idx, leg) in legs.iter().enumerate() {
            let paths = leg.real_edge_ids();
            let sub = self.sub_topology(
                step_idx,
                &paths,
                leg.from_waypoint.coordinate,
                leg.to_waypoint.coordinate,
            )?;
            debug!("subtopo[{}] : {:?}", step_idx, sub);

            highlights.push(Highlight {
                step_idx,
                from: leg.from_waypoint.coordinate,
                to: leg.to_waypoint.coordinate,
                line: self.highlight(&sub),
            });
            serialized.push(sub);
        }

        Ok(Topology {
            serialized,
            highlights,
        })
    }
}

/// Drop sections covered over zero length ([x, x], typically at
/// extremities) and repeated sections, keeping the first occurrence.
fn clean_up(paths: Vec<EdgeId>, positions: Vec<Position>) -> (Vec<EdgeId>, Vec<Position>) {
    let mut seen = AHashSet::new();
    paths
        .into_iter()
        .zip(positions)
        .filter(|(path, position)| position[0] != position[1] && seen.insert(*path))
        .unzip()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub step_idx: usize,
    pub from: Coord<f64>,
    pub to: Coord<f64>,
    pub line: LineString<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub serialized: Vec<SubTopology>,
    pub highlights: Vec<Highlight>,
}

impl Topology {
    pub fn events(&self) -> Vec<TrailEvent> {
        events_from_topology(&self.serialized)
    }
}
