//! Island falloff mask
//!
//! Zero in the middle of the map, rising to one at the edges. Subtracting it
//! from a height map sinks the borders below the lowest region.

use super::HeightMap;

/// Steepness of the falloff curve
const FALLOFF_A: f32 = 3.0;
/// Shifts where the curve crosses 0.5 (larger = bigger island)
const FALLOFF_B: f32 = 2.2;

/// Generate a `size` x `size` falloff mask
pub fn generate_falloff_map(size: usize) -> HeightMap {
    let denom = (size.max(2) - 1) as f32;
    let mut values = Vec::with_capacity(size * size);

    for y in 0..size {
        for x in 0..size {
            let nx = x as f32 / denom * 2.0 - 1.0;
            let ny = y as f32 / denom * 2.0 - 1.0;
            values.push(evaluate(nx.abs().max(ny.abs())));
        }
    }

    HeightMap::from_values(size, values)
}

fn evaluate(value: f32) -> f32 {
    let a = value.powf(FALLOFF_A);
    let b = (FALLOFF_B - FALLOFF_B * value).powf(FALLOFF_A);
    a / (a + b)
}
