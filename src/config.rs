//! Terrain configuration, loaded from JSON
//!
//! Values are fixed once streaming starts. [`TerrainConfig::sanitize`] clamps
//! anything out of range the way an editor would on input, so a loaded
//! config is always usable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::heightfield::{NoiseSettings, RegionTable, noise::MIN_NOISE_SCALE};
use crate::mesh::HeightCurve;
use crate::streaming::lod::{LodLevel, LodTable, MAX_SIMPLIFICATION, default_levels};

/// Interior samples per chunk side. 239 + 2 border samples gives a bordered
/// grid of 240 cells, divisible by every simplification stride.
pub const DEFAULT_CHUNK_SIZE: usize = 239;

/// `chunk_size + 1` must be a multiple of this, the least common multiple of
/// every stride up to 12, so the far border ring is sampled at every LOD.
pub const CHUNK_GRID_MULTIPLE: usize = 120;

/// Everything needed to stream terrain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Interior height samples per chunk side
    pub chunk_size: usize,
    /// Ascending by `visible_distance`; the last entry sets the view distance
    pub lod_levels: Vec<LodLevel>,
    /// Viewer movement (world units) that triggers a window recompute
    pub viewer_move_threshold: f32,
    pub noise: NoiseSettings,
    pub regions: RegionTable,
    /// Subtract an island falloff mask from every chunk
    pub use_falloff: bool,
    /// World-space height of elevation 1.0 after the curve
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    /// Simplification level for preview meshes (0..=6)
    pub editor_preview_lod: u32,
    /// Generation worker threads; 0 picks one per core
    pub worker_threads: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            lod_levels: default_levels(),
            viewer_move_threshold: 25.0,
            noise: NoiseSettings::default(),
            regions: RegionTable::default(),
            use_falloff: false,
            height_multiplier: 30.0,
            height_curve: HeightCurve::linear(),
            editor_preview_lod: 0,
            worker_threads: 0,
        }
    }
}

impl TerrainConfig {
    /// Load from a JSON file. Missing fields take their defaults and the
    /// result is sanitized.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded terrain config from {}", path.display());
        Ok(config)
    }

    /// Parse and sanitize a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Clamp out-of-range values in place. Returns the number of fields fixed.
    pub fn sanitize(&mut self) -> usize {
        let mut fixed = 0;

        let cells = self.chunk_size + 1;
        if cells % CHUNK_GRID_MULTIPLE != 0 {
            let rounded = ((cells + CHUNK_GRID_MULTIPLE / 2) / CHUNK_GRID_MULTIPLE).max(1) * CHUNK_GRID_MULTIPLE;
            log::warn!(
                "chunk_size {} does not divide by every LOD stride, using {}",
                self.chunk_size,
                rounded - 1
            );
            self.chunk_size = rounded - 1;
            fixed += 1;
        }

        let noise = &mut self.noise;
        if noise.lacunarity < 1.0 {
            log::warn!("lacunarity {} below 1, clamping", noise.lacunarity);
            noise.lacunarity = 1.0;
            fixed += 1;
        }
        if noise.octaves < 0 {
            log::warn!("octaves {} negative, clamping", noise.octaves);
            noise.octaves = 0;
            fixed += 1;
        }
        if noise.scale <= 0.0 {
            log::warn!("noise scale {} not positive, clamping", noise.scale);
            noise.scale = MIN_NOISE_SCALE;
            fixed += 1;
        }
        if !(0.0..=1.0).contains(&noise.persistence) {
            log::warn!("persistence {} outside 0..=1, clamping", noise.persistence);
            noise.persistence = noise.persistence.clamp(0.0, 1.0);
            fixed += 1;
        }

        if self.lod_levels.is_empty() {
            log::warn!("LOD table empty, using defaults");
            self.lod_levels = default_levels();
            fixed += 1;
        }
        let mut previous: Option<f32> = None;
        for (i, level) in self.lod_levels.iter_mut().enumerate() {
            if level.lod > MAX_SIMPLIFICATION {
                log::warn!("LOD {} simplification {} above {}, clamping", i, level.lod, MAX_SIMPLIFICATION);
                level.lod = MAX_SIMPLIFICATION;
                fixed += 1;
            }
            if let Some(prev) = previous {
                if level.visible_distance <= prev {
                    log::warn!(
                        "LOD {} distance {} not above {}, using {}",
                        i,
                        level.visible_distance,
                        prev,
                        prev + 1.0
                    );
                    level.visible_distance = prev + 1.0;
                    fixed += 1;
                }
            }
            previous = Some(level.visible_distance);
        }

        if self.viewer_move_threshold < 0.0 {
            log::warn!("viewer_move_threshold {} negative, clamping", self.viewer_move_threshold);
            self.viewer_move_threshold = 0.0;
            fixed += 1;
        }

        if self.editor_preview_lod > MAX_SIMPLIFICATION {
            log::warn!("editor_preview_lod {} above {}, clamping", self.editor_preview_lod, MAX_SIMPLIFICATION);
            self.editor_preview_lod = MAX_SIMPLIFICATION;
            fixed += 1;
        }

        fixed
    }

    /// Validated LOD table
    pub fn lod_table(&self) -> Result<LodTable> {
        LodTable::new(self.lod_levels.clone())
    }

    /// World distance between neighbouring chunk centres
    pub fn chunk_world_size(&self) -> f32 {
        (self.chunk_size - 1) as f32
    }

    /// Height samples per side including the border ring
    pub fn bordered_size(&self) -> usize {
        self.chunk_size + 2
    }
}
