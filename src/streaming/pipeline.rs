//! Off-thread heightfield and mesh generation
//!
//! Requests are spawned onto a bounded rayon pool. Each finished task pushes
//! a [`Completion`] onto a shared [`CompletionQueue`]; the consuming thread
//! drains that queue once per tick and routes every completion to the chunk
//! it belongs to.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use glam::Vec2;
use rayon::ThreadPoolBuilder;

use super::chunk::ChunkCoord;
use super::queue::CompletionQueue;
use crate::config::TerrainConfig;
use crate::core::{Error, Result};
use crate::heightfield::{HeightfieldData, HeightfieldProvider, NoiseHeightfieldProvider};
use crate::mesh::{HeightCurve, MeshPayload, build_terrain_mesh};

/// Finished work, tagged with the chunk (and LOD slot) it was requested for
#[derive(Debug)]
pub enum Completion {
    Heightfield {
        coord: ChunkCoord,
        result: Result<Arc<HeightfieldData>>,
    },
    Mesh {
        coord: ChunkCoord,
        lod_index: usize,
        result: Result<Arc<MeshPayload>>,
    },
}

impl Completion {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            Completion::Heightfield { coord, .. } | Completion::Mesh { coord, .. } => *coord,
        }
    }
}

/// Where chunks send generation requests.
///
/// Implemented by [`GenerationPipeline`]; chunks only ever see this trait so
/// they can be driven by a recording sink in tests.
pub trait TaskSink {
    /// Generate the heightfield for the chunk centred on `center`
    fn request_heightfield(&self, coord: ChunkCoord, center: Vec2);

    /// Build the mesh for table slot `lod_index` at simplification `lod`
    fn request_mesh(
        &self,
        coord: ChunkCoord,
        lod_index: usize,
        lod: u32,
        heightfield: Arc<HeightfieldData>,
    );
}

/// Inputs to the mesh builder that are the same for every chunk
#[derive(Clone, Debug)]
pub struct MeshSettings {
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            height_multiplier: 30.0,
            height_curve: HeightCurve::linear(),
        }
    }
}

/// Bounded worker pool plus the completion queue it reports into
pub struct GenerationPipeline {
    pool: rayon::ThreadPool,
    provider: Arc<dyn HeightfieldProvider>,
    mesh_settings: Arc<MeshSettings>,
    completions: Arc<CompletionQueue<Completion>>,
    in_flight: Arc<AtomicUsize>,
}

impl GenerationPipeline {
    /// Create a pipeline with `worker_threads` workers (0 = one per core)
    pub fn new(
        provider: Arc<dyn HeightfieldProvider>,
        mesh_settings: MeshSettings,
        worker_threads: usize,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("terrain-gen-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        log::info!("Generation pipeline started with {} workers", pool.current_num_threads());

        Ok(Self {
            pool,
            provider,
            mesh_settings: Arc::new(mesh_settings),
            completions: Arc::new(CompletionQueue::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Pipeline using the noise heightfield provider described by `config`
    pub fn from_config(config: &TerrainConfig) -> Result<Self> {
        let provider = Arc::new(NoiseHeightfieldProvider::new(config));
        let mesh_settings = MeshSettings {
            height_multiplier: config.height_multiplier,
            height_curve: config.height_curve.clone(),
        };
        Self::new(provider, mesh_settings, config.worker_threads)
    }

    pub fn mesh_settings(&self) -> &MeshSettings {
        &self.mesh_settings
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Tasks dispatched whose completion has not been queued yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Completions waiting to be drained
    pub fn queued(&self) -> usize {
        self.completions.len()
    }

    /// Take every completion queued so far. Never waits for running tasks.
    pub fn drain(&self) -> Vec<Completion> {
        self.completions.drain()
    }

    /// Block until nothing is in flight or `timeout` passes.
    ///
    /// Only for tools and tests; the streaming loop never waits.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn spawn_task<F>(&self, task: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        let completions = Arc::clone(&self.completions);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::AcqRel);

        self.pool.spawn(move || {
            let completion = task();
            completions.push(completion);
            in_flight.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

impl TaskSink for GenerationPipeline {
    fn request_heightfield(&self, coord: ChunkCoord, center: Vec2) {
        let provider = Arc::clone(&self.provider);
        self.spawn_task(move || {
            let result = run_guarded("heightfield", || provider.generate(center)).map(Arc::new);
            log::trace!("Heightfield for {:?} finished (ok: {})", coord, result.is_ok());
            Completion::Heightfield { coord, result }
        });
    }

    fn request_mesh(
        &self,
        coord: ChunkCoord,
        lod_index: usize,
        lod: u32,
        heightfield: Arc<HeightfieldData>,
    ) {
        let settings = Arc::clone(&self.mesh_settings);
        self.spawn_task(move || {
            let result = run_guarded("mesh", || {
                Ok(build_terrain_mesh(
                    &heightfield.elevation,
                    settings.height_multiplier,
                    &settings.height_curve,
                    lod,
                ))
            })
            .map(Arc::new);
            log::trace!("Mesh for {:?} lod slot {} finished (ok: {})", coord, lod_index, result.is_ok());
            Completion::Mesh { coord, lod_index, result }
        });
    }
}

/// Run a task body, turning a panic into `Error::Generation`.
///
/// A panic escaping into the rayon pool would abort the process.
fn run_guarded<T>(task: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Generation(format!(
            "{} task panicked: {}",
            task,
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
