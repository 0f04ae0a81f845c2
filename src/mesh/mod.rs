//! Seam-correct terrain meshes built from bordered heightfields

pub mod curve;
pub mod payload;
pub mod builder;

pub use builder::{build_terrain_mesh, vertices_per_line};
pub use curve::{HeightCurve, Keyframe};
pub use payload::{MeshPayload, TerrainVertex};
