//! Terrain chunk: one grid cell with its heightfield and per-LOD meshes

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::lod::LodTable;
use super::pipeline::TaskSink;
use crate::core::Result;
use crate::heightfield::HeightfieldData;
use crate::math::Bounds;
use crate::mesh::MeshPayload;
use crate::texture::TerrainTexture;

/// Chunk coordinate in the world grid (x, z on the ground plane)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk whose centre is nearest to `pos`
    pub fn from_world_pos(pos: Vec2, chunk_world_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_world_size).round() as i32,
            y: (pos.y / chunk_world_size).round() as i32,
        }
    }

    /// World-space centre of this chunk
    pub fn world_origin(&self, chunk_world_size: f32) -> Vec2 {
        Vec2::new(
            self.x as f32 * chunk_world_size,
            self.y as f32 * chunk_world_size,
        )
    }
}

/// Where a chunk is in its generation lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Heightfield requested (or waiting for a retry), nothing to show
    AwaitingHeightfield,
    /// Heightfield present, no LOD chosen yet
    HeightfieldReady,
    /// The wanted LOD is being built; an older mesh may still be active
    MeshPending { lod_index: usize },
    /// The wanted LOD is active
    MeshReady { lod_index: usize },
}

/// What a chunk needs to re-evaluate itself
pub struct RefreshContext<'a> {
    pub viewer: Vec2,
    pub lods: &'a LodTable,
    pub sink: &'a dyn TaskSink,
}

#[derive(Default)]
struct LodSlot {
    mesh: Option<Arc<MeshPayload>>,
    requested: bool,
}

pub struct TerrainChunk {
    coord: ChunkCoord,
    position: Vec2,
    bounds: Bounds,
    heightfield: Option<Arc<HeightfieldData>>,
    heightfield_requested: bool,
    texture: Option<TerrainTexture>,
    lods: Vec<LodSlot>,
    active_lod: Option<usize>,
    desired_lod: Option<usize>,
    visible: bool,
}

impl TerrainChunk {
    /// Create the chunk at `coord` and request its heightfield
    pub fn new(coord: ChunkCoord, chunk_world_size: f32, lod_count: usize, sink: &dyn TaskSink) -> Self {
        let position = coord.world_origin(chunk_world_size);
        let mut chunk = Self {
            coord,
            position,
            bounds: Bounds::from_center_size(position, Vec2::splat(chunk_world_size)),
            heightfield: None,
            heightfield_requested: false,
            texture: None,
            lods: (0..lod_count).map(|_| LodSlot::default()).collect(),
            active_lod: None,
            desired_lod: None,
            visible: false,
        };
        chunk.request_heightfield(sink);
        chunk
    }

    fn request_heightfield(&mut self, sink: &dyn TaskSink) {
        log::debug!("Requesting heightfield for chunk {:?}", self.coord);
        self.heightfield_requested = true;
        sink.request_heightfield(self.coord, self.position);
    }

    /// Re-evaluate visibility and LOD for the current viewer position.
    ///
    /// Swaps to a cached mesh immediately or requests the missing one. Before
    /// the heightfield arrives this only re-requests a failed heightfield.
    /// Returns whether the chunk is visible.
    pub fn refresh(&mut self, ctx: &RefreshContext<'_>) -> bool {
        let Some(heightfield) = &self.heightfield else {
            if !self.heightfield_requested {
                self.request_heightfield(ctx.sink);
            }
            self.visible = false;
            return false;
        };

        let distance = self.bounds.distance(ctx.viewer);
        let visible = distance <= ctx.lods.max_view_distance();

        if visible {
            let lod_index = ctx.lods.select(distance);
            self.desired_lod = Some(lod_index);

            if self.active_lod != Some(lod_index) {
                match (self.lods.get_mut(lod_index), ctx.lods.get(lod_index)) {
                    (Some(slot), Some(level)) => {
                        if slot.mesh.is_some() {
                            self.active_lod = Some(lod_index);
                        } else if !slot.requested {
                            slot.requested = true;
                            ctx.sink.request_mesh(self.coord, lod_index, level.lod, Arc::clone(heightfield));
                        }
                    }
                    _ => log::warn!("Chunk {:?} has no LOD slot {}", self.coord, lod_index),
                }
            }
        }

        self.visible = visible;
        visible
    }

    /// Store a finished heightfield and re-evaluate.
    ///
    /// A failed result is logged and the heightfield is requested again on
    /// the next refresh. A colour map that can't become a texture only costs
    /// the texture; the chunk still meshes.
    pub fn on_heightfield_received(
        &mut self,
        result: Result<Arc<HeightfieldData>>,
        ctx: &RefreshContext<'_>,
    ) -> bool {
        self.heightfield_requested = false;

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Heightfield for chunk {:?} failed: {}", self.coord, e);
                return self.visible;
            }
        };

        let size = data.chunk_size() as u32;
        self.texture = match TerrainTexture::from_color_map(&data.colors, size, size) {
            Ok(texture) => Some(texture),
            Err(e) => {
                log::warn!("Texture for chunk {:?} failed: {}", self.coord, e);
                None
            }
        };
        self.heightfield = Some(data);
        self.refresh(ctx)
    }

    /// Cache a finished mesh for `lod_index` and re-evaluate, adopting the
    /// mesh if that LOD is still the one wanted.
    pub fn on_mesh_received(
        &mut self,
        lod_index: usize,
        result: Result<Arc<MeshPayload>>,
        ctx: &RefreshContext<'_>,
    ) -> bool {
        let Some(slot) = self.lods.get_mut(lod_index) else {
            log::warn!("Chunk {:?} got a mesh for unknown LOD slot {}", self.coord, lod_index);
            return self.visible;
        };
        slot.requested = false;

        match result {
            Ok(mesh) => {
                slot.mesh = Some(mesh);
                self.refresh(ctx)
            }
            Err(e) => {
                log::warn!("Mesh for chunk {:?} LOD slot {} failed: {}", self.coord, lod_index, e);
                self.visible
            }
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn state(&self) -> ChunkState {
        if self.heightfield.is_none() {
            return ChunkState::AwaitingHeightfield;
        }
        match (self.desired_lod, self.active_lod) {
            (Some(want), Some(active)) if want == active => ChunkState::MeshReady { lod_index: active },
            (Some(want), _) => ChunkState::MeshPending { lod_index: want },
            (None, _) => ChunkState::HeightfieldReady,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World-space centre
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn heightfield(&self) -> Option<&Arc<HeightfieldData>> {
        self.heightfield.as_ref()
    }

    pub fn texture(&self) -> Option<&TerrainTexture> {
        self.texture.as_ref()
    }

    pub fn active_lod(&self) -> Option<usize> {
        self.active_lod
    }

    /// Mesh currently shown, if any
    pub fn active_mesh(&self) -> Option<&Arc<MeshPayload>> {
        self.active_lod
            .and_then(|i| self.lods.get(i))
            .and_then(|slot| slot.mesh.as_ref())
    }

    pub fn has_mesh(&self, lod_index: usize) -> bool {
        self.lods.get(lod_index).is_some_and(|slot| slot.mesh.is_some())
    }

    /// Number of LOD slots with a cached mesh
    pub fn cached_mesh_count(&self) -> usize {
        self.lods.iter().filter(|slot| slot.mesh.is_some()).count()
    }

    /// Whether any generation task for this chunk is outstanding
    pub fn has_pending_work(&self) -> bool {
        self.heightfield_requested || self.lods.iter().any(|slot| slot.requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::heightfield::HeightMap;
    use crate::streaming::lod::LodLevel;
    use std::cell::RefCell;

    const SIZE: f32 = 100.0;

    #[derive(Debug, Clone, PartialEq)]
    enum Request {
        Heightfield(ChunkCoord, Vec2),
        Mesh(ChunkCoord, usize, u32),
    }

    #[derive(Default)]
    struct RecordingSink {
        requests: RefCell<Vec<Request>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Request> {
            std::mem::take(&mut *self.requests.borrow_mut())
        }
    }

    impl TaskSink for RecordingSink {
        fn request_heightfield(&self, coord: ChunkCoord, center: Vec2) {
            self.requests.borrow_mut().push(Request::Heightfield(coord, center));
        }

        fn request_mesh(&self, coord: ChunkCoord, lod_index: usize, lod: u32, _heightfield: Arc<HeightfieldData>) {
            self.requests.borrow_mut().push(Request::Mesh(coord, lod_index, lod));
        }
    }

    fn lods() -> LodTable {
        LodTable::new(vec![
            LodLevel::new(0, 100.0),
            LodLevel::new(2, 200.0),
            LodLevel::new(4, 300.0),
        ])
        .unwrap()
    }

    fn heightfield() -> Arc<HeightfieldData> {
        Arc::new(HeightfieldData {
            elevation: HeightMap::filled(9, 0.5),
            colors: vec![[10, 20, 30, 255]; 49],
        })
    }

    fn mesh() -> Result<Arc<MeshPayload>> {
        Ok(Arc::new(MeshPayload::default()))
    }

    fn ctx<'a>(viewer: Vec2, lods: &'a LodTable, sink: &'a RecordingSink) -> RefreshContext<'a> {
        RefreshContext { viewer, lods, sink }
    }

    /// Chunk at the origin with its heightfield delivered, requests cleared
    fn ready_chunk(lods: &LodTable, sink: &RecordingSink, viewer: Vec2) -> TerrainChunk {
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), SIZE, lods.len(), sink);
        chunk.on_heightfield_received(Ok(heightfield()), &ctx(viewer, lods, sink));
        sink.take();
        chunk
    }

    #[test]
    fn test_coord_world_conversion() {
        let c = ChunkCoord::new(3, -2);
        assert_eq!(c.world_origin(238.0), Vec2::new(714.0, -476.0));
        assert_eq!(ChunkCoord::from_world_pos(Vec2::new(714.0, -476.0), 238.0), c);
        assert_eq!(ChunkCoord::from_world_pos(Vec2::new(118.0, -118.0), 238.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world_pos(Vec2::new(120.0, -120.0), 238.0), ChunkCoord::new(1, -1));
    }

    #[test]
    fn test_bounds_centered_on_origin() {
        let sink = RecordingSink::default();
        for (x, y) in [(0, 0), (1, -1), (-5, 7)] {
            let coord = ChunkCoord::new(x, y);
            let chunk = TerrainChunk::new(coord, SIZE, 3, &sink);
            assert_eq!(chunk.position(), Vec2::new(x as f32 * SIZE, y as f32 * SIZE));
            assert_eq!(chunk.bounds().center(), chunk.position());
            assert_eq!(chunk.bounds().size(), Vec2::splat(SIZE));
        }
    }

    #[test]
    fn test_new_chunk_requests_heightfield_once() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = TerrainChunk::new(ChunkCoord::new(1, 0), SIZE, lods.len(), &sink);
        assert_eq!(sink.take(), vec![Request::Heightfield(ChunkCoord::new(1, 0), Vec2::new(100.0, 0.0))]);
        assert_eq!(chunk.state(), ChunkState::AwaitingHeightfield);

        // Refresh while waiting is a no-op
        assert!(!chunk.refresh(&ctx(Vec2::ZERO, &lods, &sink)));
        assert!(sink.take().is_empty());
        assert!(!chunk.is_visible());
    }

    #[test]
    fn test_heightfield_triggers_mesh_request() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), SIZE, lods.len(), &sink);
        sink.take();

        let visible = chunk.on_heightfield_received(Ok(heightfield()), &ctx(Vec2::ZERO, &lods, &sink));
        assert!(visible);
        assert_eq!(sink.take(), vec![Request::Mesh(ChunkCoord::new(0, 0), 0, 0)]);
        assert_eq!(chunk.state(), ChunkState::MeshPending { lod_index: 0 });
        assert_eq!(chunk.texture().map(|t| t.width()), Some(7));

        // Still in flight: no duplicate request
        chunk.refresh(&ctx(Vec2::ZERO, &lods, &sink));
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_mesh_received_becomes_active() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = ready_chunk(&lods, &sink, Vec2::ZERO);

        chunk.on_mesh_received(0, mesh(), &ctx(Vec2::ZERO, &lods, &sink));
        assert_eq!(chunk.active_lod(), Some(0));
        assert!(chunk.active_mesh().is_some());
        assert_eq!(chunk.state(), ChunkState::MeshReady { lod_index: 0 });
        assert!(!chunk.has_pending_work());
    }

    #[test]
    fn test_lod_follows_distance() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = ready_chunk(&lods, &sink, Vec2::ZERO);

        // Edge at 50: viewer at 150 is 100 away (not past the first threshold)
        chunk.refresh(&ctx(Vec2::new(150.0, 0.0), &lods, &sink));
        assert!(sink.take().is_empty());

        // 150 away: second level
        chunk.refresh(&ctx(Vec2::new(200.0, 0.0), &lods, &sink));
        assert_eq!(sink.take(), vec![Request::Mesh(ChunkCoord::new(0, 0), 1, 2)]);

        // 250 away: third level
        chunk.refresh(&ctx(Vec2::new(300.0, 0.0), &lods, &sink));
        assert_eq!(sink.take(), vec![Request::Mesh(ChunkCoord::new(0, 0), 2, 4)]);
    }

    #[test]
    fn test_cached_lod_never_rerequested() {
        let lods = lods();
        let sink = RecordingSink::default();
        let near = Vec2::ZERO;
        let far = Vec2::new(200.0, 0.0);
        let mut chunk = ready_chunk(&lods, &sink, near);

        chunk.on_mesh_received(0, mesh(), &ctx(near, &lods, &sink));
        chunk.refresh(&ctx(far, &lods, &sink));
        chunk.on_mesh_received(1, mesh(), &ctx(far, &lods, &sink));
        assert_eq!(sink.take().len(), 1);
        assert_eq!(chunk.active_lod(), Some(1));

        for _ in 0..5 {
            chunk.refresh(&ctx(near, &lods, &sink));
            assert_eq!(chunk.active_lod(), Some(0));
            chunk.refresh(&ctx(far, &lods, &sink));
            assert_eq!(chunk.active_lod(), Some(1));
        }
        assert!(sink.take().is_empty());
        assert_eq!(chunk.cached_mesh_count(), 2);
    }

    #[test]
    fn test_stale_mesh_cached_but_not_adopted() {
        let lods = lods();
        let sink = RecordingSink::default();
        let near = Vec2::ZERO;
        let far = Vec2::new(200.0, 0.0);
        let mut chunk = ready_chunk(&lods, &sink, near);

        chunk.on_mesh_received(0, mesh(), &ctx(near, &lods, &sink));
        chunk.refresh(&ctx(far, &lods, &sink));
        // Viewer came back before the coarse mesh finished
        chunk.refresh(&ctx(near, &lods, &sink));
        chunk.on_mesh_received(1, mesh(), &ctx(near, &lods, &sink));

        assert_eq!(chunk.active_lod(), Some(0));
        assert!(chunk.has_mesh(1));
    }

    #[test]
    fn test_out_of_range_hides_without_requests() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = ready_chunk(&lods, &sink, Vec2::new(1000.0, 0.0));
        assert!(!chunk.is_visible());
        assert_eq!(chunk.state(), ChunkState::HeightfieldReady);

        // Exactly at max view distance is still visible
        assert!(chunk.refresh(&ctx(Vec2::new(350.0, 0.0), &lods, &sink)));
        assert!(!chunk.refresh(&ctx(Vec2::new(350.5, 0.0), &lods, &sink)));
        assert_eq!(sink.take().len(), 1);
    }

    #[test]
    fn test_failed_heightfield_retried_on_refresh() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), SIZE, lods.len(), &sink);
        sink.take();

        let failed = Err(Error::Generation("provider down".into()));
        assert!(!chunk.on_heightfield_received(failed, &ctx(Vec2::ZERO, &lods, &sink)));
        assert_eq!(chunk.state(), ChunkState::AwaitingHeightfield);
        assert!(!chunk.has_pending_work());

        chunk.refresh(&ctx(Vec2::ZERO, &lods, &sink));
        assert_eq!(sink.take(), vec![Request::Heightfield(ChunkCoord::new(0, 0), Vec2::ZERO)]);
    }

    #[test]
    fn test_bad_color_map_still_meshes() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), SIZE, lods.len(), &sink);
        sink.take();

        let short_colors = Arc::new(HeightfieldData {
            elevation: HeightMap::filled(9, 0.5),
            colors: vec![[10, 20, 30, 255]; 10],
        });
        assert!(chunk.on_heightfield_received(Ok(short_colors), &ctx(Vec2::ZERO, &lods, &sink)));
        assert!(chunk.texture().is_none());
        assert!(chunk.heightfield().is_some());
        assert_eq!(sink.take(), vec![Request::Mesh(ChunkCoord::new(0, 0), 0, 0)]);
        assert_eq!(chunk.state(), ChunkState::MeshPending { lod_index: 0 });
    }

    #[test]
    fn test_failed_mesh_retried_on_refresh() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = ready_chunk(&lods, &sink, Vec2::ZERO);

        chunk.on_mesh_received(0, Err(Error::Generation("boom".into())), &ctx(Vec2::ZERO, &lods, &sink));
        assert_eq!(chunk.active_lod(), None);

        chunk.refresh(&ctx(Vec2::ZERO, &lods, &sink));
        assert_eq!(sink.take(), vec![Request::Mesh(ChunkCoord::new(0, 0), 0, 0)]);
    }

    #[test]
    fn test_unknown_lod_slot_ignored() {
        let lods = lods();
        let sink = RecordingSink::default();
        let mut chunk = ready_chunk(&lods, &sink, Vec2::ZERO);
        chunk.on_mesh_received(9, mesh(), &ctx(Vec2::ZERO, &lods, &sink));
        assert_eq!(chunk.cached_mesh_count(), 0);
    }
}
