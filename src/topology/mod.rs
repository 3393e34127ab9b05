pub mod events;
pub mod geometry;
pub mod serializer;
