//! Fractal Perlin noise height maps
//!
//! Sums `octaves` layers of Perlin noise. Each octave samples at a higher
//! frequency (`lacunarity`) with a smaller amplitude (`persistence`), and each
//! gets its own seed-derived sample offset so octaves do not line up.

use glam::Vec2;
use ::noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::HeightMap;

/// Smallest usable horizontal scale; anything at or below zero is clamped here
pub const MIN_NOISE_SCALE: f32 = 0.0001;

/// Octave offsets are drawn from `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)`
const OCTAVE_OFFSET_RANGE: f32 = 100_000.0;

/// Divisor applied to the theoretical maximum height in global mode.
/// Summed octaves rarely approach the theoretical peak, so the range is
/// tightened to keep the output spread over `[0, 1]`.
const GLOBAL_HEIGHT_ESTIMATE: f32 = 1.75;

/// How raw noise heights are mapped into the `[0, 1]` range
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Stretch each map by its own min/max. Adjacent chunks will not match.
    Local,
    /// Scale by the theoretical maximum amplitude. Adjacent chunks agree at
    /// shared edges, which endless terrain requires.
    #[default]
    Global,
}

/// Parameters controlling noise map generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub octaves: i32,      // Noise layers summed
    pub persistence: f32,  // Amplitude falloff per octave, 0..=1
    pub lacunarity: f32,   // Frequency growth per octave, >= 1
    pub offset: Vec2,      // Added to every chunk's sample position
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 50.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

/// Reusable noise sampler; builds the Perlin source and octave offsets once
#[derive(Clone, Debug)]
pub struct NoiseSampler {
    settings: NoiseSettings,
    perlin: Perlin,
    octave_offsets: Vec<Vec2>,
    max_possible_height: f32,
}

impl NoiseSampler {
    /// Create a sampler for the given settings
    pub fn new(settings: NoiseSettings) -> Self {
        let octaves = settings.octaves.max(0) as u32;
        let octave_offsets = (0..octaves)
            .map(|i| {
                Vec2::new(
                    offset_from_seed(settings.seed, i * 2),
                    offset_from_seed(settings.seed, i * 2 + 1),
                )
            })
            .collect();

        let mut max_possible_height = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..octaves {
            max_possible_height += amplitude;
            amplitude *= settings.persistence;
        }

        Self {
            perlin: Perlin::new(settings.seed),
            settings,
            octave_offsets,
            max_possible_height,
        }
    }

    /// Get the settings this sampler was built from
    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Generate a `size` x `size` map centred on `center` (world units)
    pub fn generate(&self, size: usize, center: Vec2) -> HeightMap {
        // Sample positions are summed in f64 so that maps sharing an edge
        // produce bit-identical samples along it
        let scale = self.settings.scale.max(MIN_NOISE_SCALE) as f64;
        let half = size as f64 / 2.0;
        // Noise Y grows "down" the map while world Z grows "up"
        let shift_x = self.settings.offset.x as f64 + center.x as f64;
        let shift_y = -(self.settings.offset.y as f64 + center.y as f64);

        let mut values = Vec::with_capacity(size * size);
        let mut min_local = f32::MAX;
        let mut max_local = f32::MIN;

        for y in 0..size {
            for x in 0..size {
                let mut amplitude = 1.0;
                let mut frequency = 1.0_f64;
                let mut height = 0.0;

                for octave_offset in &self.octave_offsets {
                    let sx = (x as f64 - half + octave_offset.x as f64 + shift_x) / scale * frequency;
                    let sy = (y as f64 - half + octave_offset.y as f64 + shift_y) / scale * frequency;
                    let value = self.perlin.get([sx, sy]) as f32;

                    height += value * amplitude;
                    amplitude *= self.settings.persistence;
                    frequency *= self.settings.lacunarity as f64;
                }

                min_local = min_local.min(height);
                max_local = max_local.max(height);
                values.push(height);
            }
        }

        match self.settings.normalize_mode {
            NormalizeMode::Local => {
                let range = max_local - min_local;
                for v in &mut values {
                    *v = if range > 0.0 { (*v - min_local) / range } else { 0.0 };
                }
            }
            NormalizeMode::Global => {
                let denom = 2.0 * self.max_possible_height / GLOBAL_HEIGHT_ESTIMATE;
                for v in &mut values {
                    *v = if denom > 0.0 { ((*v + 1.0) / denom).max(0.0) } else { 0.0 };
                }
            }
        }

        HeightMap::from_values(size, values)
    }
}

/// Generate a single noise map without keeping the sampler around
pub fn generate_noise_map(size: usize, settings: &NoiseSettings, center: Vec2) -> HeightMap {
    NoiseSampler::new(settings.clone()).generate(size, center)
}

/// Deterministic offset in `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)` (splitmix64)
fn offset_from_seed(seed: u32, stream: u32) -> f32 {
    let mut z = ((seed as u64) << 32 | stream as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    let unit = (z >> 40) as f32 / (1u64 << 24) as f32;
    (unit * 2.0 - 1.0) * OCTAVE_OFFSET_RANGE
}
