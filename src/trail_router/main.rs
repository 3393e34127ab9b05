// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use anyhow::{Context, bail};
use clap::Parser;
use geo_types::{Coord, LineString};
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trailnet::errors::RouteError;
use trailnet::path_network::builder::{TrailSection, build_graph_data, sections_from_geojson};
use trailnet::topology::events::steps;
use trailnet::topology::serializer::Highlight;
use trailnet::{EdgeId, Graph, GraphData, PointOnEdge, TopologyBuilder, TrailnetConfig, compute_route};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the routing graph built from trail sections
    BuildGraph {
        /// GeoJSON FeatureCollection of trail sections
        #[arg(long)]
        sections: PathBuf,
    },
    /// Route through waypoints and print the serialized topology
    Route {
        #[arg(long)]
        sections: PathBuf,
        /// Prebuilt graph JSON. Built from the sections when omitted.
        #[arg(long)]
        graph: Option<PathBuf>,
        /// JSON array of {lat, lng} with an optional `edge`
        #[arg(long)]
        waypoints: PathBuf,
        /// RON config file, defaults to $TRAILNET_CONFIG
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct WaypointInput {
    /// Snap onto the nearest section when not given.
    #[serde(default)]
    edge: Option<EdgeId>,
    lat: f64,
    lng: f64,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_env("TRAILNET_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.cmd {
        Command::BuildGraph { sections } => {
            let sections = read_sections(&sections)?;
            let data = build_graph_data(&sections);
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Command::Route {
            sections,
            graph,
            waypoints,
            config,
        } => {
            let config = load_config(config)?;
            let sections = read_sections(&sections)?;
            let data = match graph {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading graph {}", path.display()))?;
                    serde_json::from_str::<GraphData>(&text)
                        .with_context(|| format!("parsing graph {}", path.display()))?
                }
                None => build_graph_data(&sections),
            };
            let mut graph = Graph::from_data(data, config.transient_id_offset)?;
            let layers: BTreeMap<EdgeId, LineString<f64>> = sections
                .into_iter()
                .map(|TrailSection { id, polyline, .. }| (id, polyline))
                .collect();

            let waypoints = read_waypoints(&waypoints, &graph, &layers, &config)?;
            info!("Routing through {} waypoints", waypoints.len());

            let legs = match compute_route(&mut graph, &waypoints) {
                Ok(legs) => legs,
                Err(err @ RouteError::Unreachable { .. }) => {
                    bail!("invalid shape: {}", err)
                }
                Err(err) => return Err(err.into()),
            };

            let geometry = config.geometry();
            let topology = TopologyBuilder::new(&layers, &geometry, config.topology_offset)
                .build(&legs)
                .context("invalid shape")?;

            let output = serde_json::json!({
                "topology": topology.serialized,
                "events": topology.events(),
                "steps": steps(&waypoints),
                "highlight": highlight_collection(&topology.highlights),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<TrailnetConfig> {
    let path = path.or_else(|| std::env::var_os("TRAILNET_CONFIG").map(PathBuf::from));
    match path {
        Some(path) => TrailnetConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(TrailnetConfig::default()),
    }
}

fn read_sections(path: &Path) -> anyhow::Result<Vec<TrailSection>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading sections {}", path.display()))?;
    let sections = sections_from_geojson(&text)
        .with_context(|| format!("parsing sections {}", path.display()))?;
    info!("Loaded {} trail sections", sections.len());
    Ok(sections)
}

fn read_waypoints(
    path: &Path,
    graph: &Graph,
    layers: &BTreeMap<EdgeId, LineString<f64>>,
    config: &TrailnetConfig,
) -> anyhow::Result<Vec<PointOnEdge>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading waypoints {}", path.display()))?;
    let inputs: Vec<WaypointInput> = serde_json::from_str(&text)
        .with_context(|| format!("parsing waypoints {}", path.display()))?;

    let geometry = config.geometry();
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let picked = Coord {
                x: input.lng,
                y: input.lat,
            };
            let Some(edge_id) = input.edge else {
                return PointOnEdge::snap_nearest(graph, layers, picked, &geometry)
                    .with_context(|| format!("no trail section to snap waypoint {} onto", index));
            };
            let edge = graph
                .edge(edge_id)
                .with_context(|| format!("waypoint {} is on unknown edge {}", index, edge_id))?;
            let polyline = layers
                .get(&edge_id)
                .with_context(|| format!("no geometry for edge {}", edge_id))?;
            Ok(PointOnEdge::snap(edge, polyline, picked, &geometry))
        })
        .collect()
}

fn highlight_collection(highlights: &[Highlight]) -> FeatureCollection {
    let features = highlights
        .iter()
        .map(|highlight| {
            let mut properties = serde_json::Map::new();
            properties.insert("step_idx".to_string(), highlight.step_idx.into());
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&highlight.line))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
