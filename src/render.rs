//! Hand-off to whatever displays finished chunks

use glam::Vec2;

use crate::mesh::MeshPayload;
use crate::streaming::ChunkCoord;
use crate::texture::TerrainTexture;

/// One visible chunk ready to draw, borrowed from the chunk manager
#[derive(Clone, Copy, Debug)]
pub struct DrawItem<'a> {
    pub coord: ChunkCoord,
    /// World-space centre; mesh vertices are relative to it
    pub position: Vec2,
    /// Index into the LOD table of the mesh being drawn
    pub lod_index: usize,
    pub mesh: &'a MeshPayload,
    pub texture: Option<&'a TerrainTexture>,
}

/// Consumer of finished chunks (a GPU renderer, an exporter, a test recorder)
pub trait RenderSink {
    /// Called once per drawn chunk, in visible-list order
    fn submit(&mut self, item: DrawItem<'_>);

    /// Called after the last item of a frame
    fn finish_frame(&mut self) {}
}

/// Sink that only tallies what it was given
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub chunks: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub frames: usize,
}

impl RenderSink for DrawStats {
    fn submit(&mut self, item: DrawItem<'_>) {
        self.chunks += 1;
        self.vertices += item.mesh.vertex_count();
        self.triangles += item.mesh.triangle_count();
    }

    fn finish_frame(&mut self) {
        self.frames += 1;
    }
}
