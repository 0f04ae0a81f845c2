//! Heightfield generation: elevation grids plus their colour classification
//!
//! The streaming core only sees the [`HeightfieldProvider`] trait. The default
//! [`NoiseHeightfieldProvider`] combines fractal noise, an optional island
//! falloff mask and a region colour table.

pub mod noise;
pub mod falloff;
pub mod regions;

pub use self::noise::{NoiseSampler, NoiseSettings, NormalizeMode, generate_noise_map};
pub use falloff::generate_falloff_map;
pub use regions::{Color, RegionTable, TerrainRegion};

use glam::Vec2;

use crate::config::TerrainConfig;
use crate::core::Result;

/// Square grid of elevation samples, row-major (`values[y * size + x]`)
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    size: usize,
    values: Vec<f32>,
}

impl HeightMap {
    /// Grid filled with a constant value
    pub fn filled(size: usize, value: f32) -> Self {
        Self { size, values: vec![value; size * size] }
    }

    /// Wrap row-major values. `values.len()` must equal `size * size`.
    pub fn from_values(size: usize, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), size * size, "height map must be square");
        Self { size, values }
    }

    /// Build from a function of `(x, y)`
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut values = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                values.push(f(x, y));
            }
        }
        Self { size, values }
    }

    /// Samples per side
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.size + x]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Subtract `mask` cell by cell and clamp into `[0, 1]`
    pub fn subtract_clamped(&mut self, mask: &HeightMap) {
        debug_assert_eq!(self.size, mask.size);
        for (v, m) in self.values.iter_mut().zip(mask.values.iter()) {
            *v = (*v - m).clamp(0.0, 1.0);
        }
    }
}

/// Elevation grid with a one-cell border on every side plus the colour map of
/// its interior cells. Immutable once produced; shared between a chunk and its
/// mesh tasks.
#[derive(Clone, Debug)]
pub struct HeightfieldData {
    /// `chunk_size + 2` samples per side
    pub elevation: HeightMap,
    /// `chunk_size * chunk_size` colours, row-major
    pub colors: Vec<Color>,
}

impl HeightfieldData {
    /// Interior samples per side (elevation size minus the border ring)
    pub fn chunk_size(&self) -> usize {
        self.elevation.size().saturating_sub(2)
    }
}

/// Produces the heightfield for the chunk centred on `center`.
///
/// Called from worker threads, so implementations must be `Send + Sync`.
pub trait HeightfieldProvider: Send + Sync {
    fn generate(&self, center: Vec2) -> Result<HeightfieldData>;
}

/// Default provider: noise map, optional falloff mask, region colours
pub struct NoiseHeightfieldProvider {
    sampler: NoiseSampler,
    falloff: Option<HeightMap>,
    regions: RegionTable,
    chunk_size: usize,
}

impl NoiseHeightfieldProvider {
    /// Build from configuration; the falloff mask is computed once here
    pub fn new(config: &TerrainConfig) -> Self {
        let bordered = config.chunk_size + 2;
        let falloff = config.use_falloff.then(|| generate_falloff_map(bordered));
        Self {
            sampler: NoiseSampler::new(config.noise.clone()),
            falloff,
            regions: config.regions.clone(),
            chunk_size: config.chunk_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl HeightfieldProvider for NoiseHeightfieldProvider {
    fn generate(&self, center: Vec2) -> Result<HeightfieldData> {
        let mut elevation = self.sampler.generate(self.chunk_size + 2, center);
        if let Some(falloff) = &self.falloff {
            elevation.subtract_clamped(falloff);
        }
        let colors = self.regions.color_map(&elevation, 1, self.chunk_size);
        Ok(HeightfieldData { elevation, colors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            chunk_size: 15,
            ..Default::default()
        }
    }

    #[test]
    fn test_height_map_accessors() {
        let map = HeightMap::from_fn(3, |x, y| (y * 3 + x) as f32);
        assert_eq!(map.size(), 3);
        assert_eq!(map.get(2, 1), 5.0);
        assert_eq!(map.values().len(), 9);
    }

    #[test]
    fn test_subtract_clamped() {
        let mut map = HeightMap::filled(2, 0.5);
        let mask = HeightMap::from_values(2, vec![0.0, 0.25, 1.0, -1.0]);
        map.subtract_clamped(&mask);
        assert_eq!(map.values(), &[0.5, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn test_provider_output_sizes() {
        let provider = NoiseHeightfieldProvider::new(&small_config());
        let data = provider.generate(Vec2::ZERO).unwrap();
        assert_eq!(data.elevation.size(), 17);
        assert_eq!(data.chunk_size(), 15);
        assert_eq!(data.colors.len(), 15 * 15);
    }

    #[test]
    fn test_provider_with_falloff_is_clamped() {
        let config = TerrainConfig {
            use_falloff: true,
            ..small_config()
        };
        let provider = NoiseHeightfieldProvider::new(&config);
        let data = provider.generate(Vec2::new(30.0, 60.0)).unwrap();
        assert!(data.elevation.values().iter().all(|v| (0.0..=1.0).contains(v)));
        // Corners of the bordered grid are fully masked
        assert_eq!(data.elevation.get(0, 0), 0.0);
    }
}
