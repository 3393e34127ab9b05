// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

#[macro_use]
extern crate serde;

pub mod config;
pub mod errors;
pub mod path_network;
pub mod topology;

pub use config::TrailnetConfig;
pub use path_network::graph::{Edge, EdgeId, Graph, GraphData, NodeId};
pub use path_network::router::{RouteLeg, compute_route};
pub use path_network::waypoint::PointOnEdge;
pub use topology::serializer::{SubTopology, Topology, TopologyBuilder};
