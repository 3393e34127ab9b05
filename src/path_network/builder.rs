// Builds the client-side routing graph from trail-section geometries.
//
// Every distinct endpoint coordinate becomes a node; node ids are handed out
// from 1 in first-seen order so they stay small and stable for a given input.

use crate::errors::SectionError;
use crate::path_network::graph::{Edge, EdgeId, GraphData, NodeId};
use crate::topology::geometry::haversine_length;
use ahash::AHashMap;
use geo_types::{Coord, LineString};
use geojson::{FeatureCollection, GeoJson};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TrailSection {
    pub id: EdgeId,
    pub polyline: LineString<f64>,
    /// Length in meters, if known.
    pub length: Option<f64>,
}

impl TrailSection {
    fn routing_length(&self) -> f64 {
        match self.length {
            Some(length) if !length.is_nan() => length,
            _ => 0.0,
        }
    }
}

#[derive(Default)]
struct NodeKeys {
    ids: AHashMap<(u64, u64), NodeId>,
}

impl NodeKeys {
    fn key(&mut self, coord: Coord<f64>) -> NodeId {
        let next = self.ids.len() as NodeId + 1;
        *self
            .ids
            .entry((coord.x.to_bits(), coord.y.to_bits()))
            .or_insert(next)
    }
}

pub fn build_graph_data(sections: &[TrailSection]) -> GraphData {
    let mut keys = NodeKeys::default();
    let mut nodes: BTreeMap<NodeId, BTreeMap<NodeId, EdgeId>> = BTreeMap::new();
    let mut edges = BTreeMap::new();

    for section in sections {
        let (Some(start), Some(end)) = (section.polyline.0.first(), section.polyline.0.last())
        else {
            warn!("Trail section {} has no geometry, skipping", section.id);
            continue;
        };
        let start_node = keys.key(*start);
        let end_node = keys.key(*end);

        nodes.entry(start_node).or_default().insert(end_node, section.id);
        nodes.entry(end_node).or_default().insert(start_node, section.id);
        edges.insert(
            section.id,
            Edge {
                id: section.id,
                length: section.routing_length(),
                nodes_id: [start_node, end_node],
            },
        );
    }

    info!(
        "Built routing graph with {} nodes and {} edges",
        nodes.len(),
        edges.len()
    );

    GraphData { nodes, edges }
}

/// Read trail sections from a GeoJSON FeatureCollection of LineStrings.
/// Each feature carries its id in a `pk` property and optionally a `length`
/// in meters; missing lengths are measured along the geometry.
pub fn sections_from_geojson(text: &str) -> Result<Vec<TrailSection>, SectionError> {
    let geojson: GeoJson = text.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut sections = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = feature
            .property("pk")
            .and_then(|pk| {
                pk.as_u64()
                    .or_else(|| pk.as_str().and_then(|s| s.parse().ok()))
            })
            .ok_or(SectionError::MissingId(index))?;
        let length = feature.property("length").and_then(|length| length.as_f64());

        let geometry = feature.geometry.ok_or(SectionError::NotALineString(id))?;
        let polyline = LineString::<f64>::try_from(geometry.value)
            .map_err(|_| SectionError::NotALineString(id))?;

        let length = length.or_else(|| Some(haversine_length(&polyline)));
        sections.push(TrailSection {
            id,
            polyline,
            length,
        });
    }

    Ok(sections)
}
