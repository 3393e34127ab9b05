pub mod builder;
pub mod dijkstra;
pub mod graph;
pub mod id_allocator;
pub mod router;
pub mod waypoint;
