//! Chunk streaming around a moving viewer
//!
//! [`ChunkManager`] owns the chunks, [`TerrainChunk`] tracks one cell's
//! heightfield and per-LOD meshes, and [`GenerationPipeline`] does the heavy
//! lifting on a worker pool, handing results back through a
//! [`CompletionQueue`].

pub mod lod;
pub mod queue;
pub mod pipeline;
pub mod chunk;
pub mod manager;

pub use lod::{LodLevel, LodTable, MAX_SIMPLIFICATION, simplification_stride};
pub use queue::CompletionQueue;
pub use pipeline::{Completion, GenerationPipeline, MeshSettings, TaskSink};
pub use chunk::{ChunkCoord, ChunkState, RefreshContext, TerrainChunk};
pub use manager::ChunkManager;
