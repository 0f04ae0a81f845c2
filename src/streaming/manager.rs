//! Chunk manager: keeps the chunk window around the viewer up to date

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec2;

use super::chunk::{ChunkCoord, RefreshContext, TerrainChunk};
use super::lod::LodTable;
use super::pipeline::{Completion, GenerationPipeline};
use crate::config::TerrainConfig;
use crate::core::Result;
use crate::render::{DrawItem, RenderSink};

/// Owns every chunk and the list of chunks currently in view.
///
/// Single-threaded: all methods run on the consuming thread. Generation runs
/// on the pipeline's workers and comes back through [`ChunkManager::tick`].
pub struct ChunkManager {
    pipeline: GenerationPipeline,
    lods: LodTable,
    chunk_world_size: f32,
    /// Window radius in chunks
    view_radius: i32,
    move_threshold_sq: f32,
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    visible: Vec<ChunkCoord>,
    viewer: Vec2,
    last_update_viewer: Option<Vec2>,
    recompute_count: u64,
}

impl ChunkManager {
    pub fn new(config: &TerrainConfig, pipeline: GenerationPipeline) -> Result<Self> {
        let lods = config.lod_table()?;
        let chunk_world_size = config.chunk_world_size();
        let view_radius = (lods.max_view_distance() / chunk_world_size).round() as i32;
        let threshold = config.viewer_move_threshold;

        log::info!(
            "Chunk manager: chunk size {}, view distance {}, window radius {}",
            chunk_world_size,
            lods.max_view_distance(),
            view_radius
        );

        Ok(Self {
            pipeline,
            lods,
            chunk_world_size,
            view_radius,
            move_threshold_sq: threshold * threshold,
            chunks: HashMap::new(),
            visible: Vec::new(),
            viewer: Vec2::ZERO,
            last_update_viewer: None,
            recompute_count: 0,
        })
    }

    /// Record the viewer position (x, z) and recompute the chunk window if it
    /// moved at least the threshold since the last recompute. The first call
    /// always recomputes. Returns whether a recompute happened.
    pub fn on_viewpoint_moved(&mut self, position: Vec2) -> bool {
        self.viewer = position;
        let due = match self.last_update_viewer {
            None => true,
            Some(last) => last.distance_squared(position) >= self.move_threshold_sq,
        };
        if due {
            self.last_update_viewer = Some(position);
            self.update_visible_chunks();
        }
        due
    }

    /// Rebuild the visible list from the window around the viewer, creating
    /// chunks that do not exist yet.
    pub fn update_visible_chunks(&mut self) {
        self.recompute_count += 1;

        for coord in self.visible.drain(..) {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.set_visible(false);
            }
        }

        let center = ChunkCoord::from_world_pos(self.viewer, self.chunk_world_size);
        log::debug!("Recomputing visible chunks around {:?} (radius {})", center, self.view_radius);

        let ctx = RefreshContext {
            viewer: self.viewer,
            lods: &self.lods,
            sink: &self.pipeline,
        };
        let r = self.view_radius;
        for dy in -r..=r {
            for dx in -r..=r {
                let coord = ChunkCoord::new(center.x + dx, center.y + dy);
                match self.chunks.get_mut(&coord) {
                    Some(chunk) => {
                        if chunk.refresh(&ctx) {
                            self.visible.push(coord);
                        }
                    }
                    None => {
                        log::debug!("Creating chunk {:?}", coord);
                        let chunk = TerrainChunk::new(coord, self.chunk_world_size, self.lods.len(), ctx.sink);
                        self.chunks.insert(coord, chunk);
                    }
                }
            }
        }
    }

    /// Deliver every completion queued so far to its chunk. Never waits for
    /// running tasks. Returns the number of completions handled.
    pub fn tick(&mut self) -> usize {
        let completions = self.pipeline.drain();
        let count = completions.len();
        if count > 0 {
            log::trace!("Delivering {} completions", count);
        }

        for completion in completions {
            let coord = completion.coord();
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                log::debug!("Dropping completion for unknown chunk {:?}", coord);
                continue;
            };
            let ctx = RefreshContext {
                viewer: self.viewer,
                lods: &self.lods,
                sink: &self.pipeline,
            };
            let visible = match completion {
                Completion::Heightfield { result, .. } => chunk.on_heightfield_received(result, &ctx),
                Completion::Mesh { lod_index, result, .. } => chunk.on_mesh_received(lod_index, result, &ctx),
            };

            let listed = self.visible.contains(&coord);
            if visible && !listed {
                self.visible.push(coord);
            } else if !visible && listed {
                self.visible.retain(|c| *c != coord);
            }
        }
        count
    }

    /// Tick until no generation work is outstanding or `timeout` passes.
    ///
    /// For tools and tests; a frame loop calls [`ChunkManager::tick`] instead.
    pub fn tick_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.pipeline.in_flight() == 0 && self.pipeline.queued() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Hand every visible chunk with a mesh to `sink`. Returns the number drawn.
    pub fn draw(&self, sink: &mut dyn RenderSink) -> usize {
        let mut drawn = 0;
        for coord in &self.visible {
            let Some(chunk) = self.chunks.get(coord) else { continue };
            let (Some(lod_index), Some(mesh)) = (chunk.active_lod(), chunk.active_mesh()) else {
                continue;
            };
            sink.submit(DrawItem {
                coord: *coord,
                position: chunk.position(),
                lod_index,
                mesh: mesh.as_ref(),
                texture: chunk.texture(),
            });
            drawn += 1;
        }
        sink.finish_frame();
        drawn
    }

    /// Coordinates of the chunks currently in view
    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.visible
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&TerrainChunk> {
        self.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Meshes cached across all chunks and LODs
    pub fn cached_mesh_count(&self) -> usize {
        self.chunks.values().map(TerrainChunk::cached_mesh_count).sum()
    }

    /// Window recomputes so far
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    pub fn view_radius(&self) -> i32 {
        self.view_radius
    }

    pub fn chunk_world_size(&self) -> f32 {
        self.chunk_world_size
    }

    pub fn viewer(&self) -> Vec2 {
        self.viewer
    }

    pub fn lod_table(&self) -> &LodTable {
        &self.lods
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::{HeightMap, HeightfieldData, HeightfieldProvider};
    use crate::render::DrawStats;
    use crate::streaming::lod::LodLevel;
    use crate::streaming::pipeline::MeshSettings;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SETTLE: Duration = Duration::from_secs(20);

    /// Flat 7x7 chunks; counts calls and fails the first `fail_first`
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl HeightfieldProvider for CountingProvider {
        fn generate(&self, _center: Vec2) -> Result<HeightfieldData> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(crate::core::Error::Generation("not yet".into()));
            }
            Ok(HeightfieldData {
                elevation: HeightMap::filled(9, 0.5),
                colors: vec![[0, 128, 0, 255]; 49],
            })
        }
    }

    fn manager_with(config: &TerrainConfig, provider: Arc<CountingProvider>) -> ChunkManager {
        crate::core::logging::try_init();
        let pipeline = GenerationPipeline::new(provider, MeshSettings::default(), 2).unwrap();
        ChunkManager::new(config, pipeline).unwrap()
    }

    fn single_lod_config(distance: f32) -> TerrainConfig {
        TerrainConfig {
            lod_levels: vec![LodLevel::new(0, distance)],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_window_radius() {
        let m = manager_with(&TerrainConfig::default(), Arc::default());
        // 600 / 238 rounds to 3
        assert_eq!(m.view_radius(), 3);
        assert_eq!(m.chunk_world_size(), 238.0);
    }

    #[test]
    fn test_window_creates_square_of_chunks() {
        let provider = Arc::new(CountingProvider::default());
        let mut m = manager_with(&TerrainConfig::default(), Arc::clone(&provider));
        assert!(m.on_viewpoint_moved(Vec2::ZERO));
        assert_eq!(m.chunk_count(), 49);
        assert!(m.chunk(ChunkCoord::new(-3, 3)).is_some());
        assert!(m.chunk(ChunkCoord::new(4, 0)).is_none());
        // Nothing is visible until heightfields arrive
        assert!(m.visible_chunks().is_empty());

        assert!(m.tick_until_idle(SETTLE));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 49);
    }

    #[test]
    fn test_origin_chunk_with_real_generation_becomes_visible() {
        let config = single_lod_config(100.0);
        let pipeline = GenerationPipeline::from_config(&config).unwrap();
        let mut m = ChunkManager::new(&config, pipeline).unwrap();
        assert_eq!(m.view_radius(), 0);

        m.on_viewpoint_moved(Vec2::ZERO);
        assert_eq!(m.chunk_count(), 1);
        let origin = ChunkCoord::new(0, 0);
        assert!(m.chunk(origin).is_some());

        assert!(m.tick_until_idle(SETTLE));
        let chunk = m.chunk(origin).unwrap();
        assert!(chunk.is_visible());
        assert_eq!(chunk.active_lod(), Some(0));
        assert_eq!(chunk.active_mesh().unwrap().vertex_count(), 239 * 239);
        assert_eq!(m.visible_chunks(), &[origin]);

        let mut stats = DrawStats::default();
        assert_eq!(m.draw(&mut stats), 1);
        assert_eq!(stats.vertices, 239 * 239);
        assert_eq!(stats.triangles, 238 * 238 * 2);
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn test_move_threshold() {
        let mut m = manager_with(&single_lod_config(100.0), Arc::default());
        assert!(m.on_viewpoint_moved(Vec2::ZERO));
        assert_eq!(m.recompute_count(), 1);

        assert!(!m.on_viewpoint_moved(Vec2::new(24.99, 0.0)));
        assert_eq!(m.recompute_count(), 1);

        assert!(m.on_viewpoint_moved(Vec2::new(25.0, 0.0)));
        assert_eq!(m.recompute_count(), 2);

        // Measured from the last recompute, not the last call
        assert!(!m.on_viewpoint_moved(Vec2::new(40.0, 0.0)));
        assert_eq!(m.viewer(), Vec2::new(40.0, 0.0));
    }

    #[test]
    fn test_each_chunk_requests_heightfield_once() {
        let provider = Arc::new(CountingProvider::default());
        let mut m = manager_with(&single_lod_config(300.0), Arc::clone(&provider));
        for step in 0..10 {
            m.on_viewpoint_moved(Vec2::new((step % 2) as f32 * 30.0, 0.0));
            m.tick();
        }
        assert!(m.tick_until_idle(SETTLE));
        assert_eq!(provider.calls.load(Ordering::SeqCst), m.chunk_count());
    }

    #[test]
    fn test_visible_list_follows_viewer() {
        let mut m = manager_with(&single_lod_config(300.0), Arc::default());
        m.on_viewpoint_moved(Vec2::ZERO);
        assert!(m.tick_until_idle(SETTLE));
        assert!(m.visible_chunks().contains(&ChunkCoord::new(0, 0)));
        assert!(m.draw(&mut DrawStats::default()) > 0);

        // Far away: the old chunks drop out of the list but stay cached
        let far = Vec2::new(238.0 * 20.0, 0.0);
        m.on_viewpoint_moved(far);
        assert!(m.tick_until_idle(SETTLE));
        assert!(!m.visible_chunks().contains(&ChunkCoord::new(0, 0)));
        assert!(!m.chunk(ChunkCoord::new(0, 0)).unwrap().is_visible());
        assert!(m.visible_chunks().contains(&ChunkCoord::new(20, 0)));
        assert!(m.chunk(ChunkCoord::new(0, 0)).unwrap().has_mesh(0));

        for coord in m.visible_chunks() {
            assert!(m.chunk(*coord).unwrap().is_visible());
        }
    }

    #[test]
    fn test_failed_heightfield_retried_after_move() {
        let provider = Arc::new(CountingProvider { fail_first: 1, ..Default::default() });
        let mut m = manager_with(&single_lod_config(100.0), Arc::clone(&provider));
        let origin = ChunkCoord::new(0, 0);

        m.on_viewpoint_moved(Vec2::ZERO);
        assert!(m.tick_until_idle(SETTLE));
        assert!(!m.chunk(origin).unwrap().is_visible());

        m.on_viewpoint_moved(Vec2::new(30.0, 0.0));
        assert!(m.tick_until_idle(SETTLE));
        assert!(m.chunk(origin).unwrap().is_visible());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tick_without_work() {
        let mut m = manager_with(&TerrainConfig::default(), Arc::default());
        assert_eq!(m.tick(), 0);
        assert_eq!(m.draw(&mut DrawStats::default()), 0);
    }
}
