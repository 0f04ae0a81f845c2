//! terrain-stream - endless heightmap terrain with distance-based LOD streaming

pub mod core;
pub mod config;
pub mod math;
pub mod heightfield;
pub mod texture;
pub mod mesh;
pub mod streaming;
pub mod render;
pub mod preview;

pub use config::TerrainConfig;
pub use crate::core::{Error, Result};
