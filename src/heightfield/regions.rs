//! Height-threshold colour classification

use serde::{Deserialize, Serialize};

use super::HeightMap;

/// RGBA colour, 8 bits per channel
pub type Color = [u8; 4];

/// A named height band and the colour it is painted with
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainRegion {
    pub name: String,
    /// Lowest normalized height (inclusive) belonging to this region
    pub height: f32,
    pub color: Color,
}

impl TerrainRegion {
    pub fn new(name: &str, height: f32, color: Color) -> Self {
        Self { name: name.to_string(), height, color }
    }
}

/// Regions ordered by ascending height threshold
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TerrainRegion>", into = "Vec<TerrainRegion>")]
pub struct RegionTable {
    regions: Vec<TerrainRegion>,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new(vec![
            TerrainRegion::new("deep water", 0.0, [48, 74, 148, 255]),
            TerrainRegion::new("water", 0.3, [54, 102, 196, 255]),
            TerrainRegion::new("sand", 0.4, [210, 208, 125, 255]),
            TerrainRegion::new("grass", 0.45, [86, 152, 23, 255]),
            TerrainRegion::new("grass 2", 0.55, [62, 107, 18, 255]),
            TerrainRegion::new("rock", 0.6, [90, 69, 60, 255]),
            TerrainRegion::new("rock 2", 0.7, [75, 60, 53, 255]),
            TerrainRegion::new("snow", 0.9, [255, 255, 255, 255]),
        ])
    }
}

impl From<Vec<TerrainRegion>> for RegionTable {
    fn from(regions: Vec<TerrainRegion>) -> Self {
        Self::new(regions)
    }
}

impl From<RegionTable> for Vec<TerrainRegion> {
    fn from(table: RegionTable) -> Self {
        table.regions
    }
}

impl RegionTable {
    /// Build a table, sorting regions by threshold
    pub fn new(mut regions: Vec<TerrainRegion>) -> Self {
        regions.sort_by(|a, b| a.height.total_cmp(&b.height));
        Self { regions }
    }

    pub fn regions(&self) -> &[TerrainRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Colour of the highest region whose threshold is at or below `height`.
    ///
    /// Heights under the first threshold still get the first region's colour;
    /// an empty table yields transparent black.
    pub fn classify(&self, height: f32) -> Color {
        let mut color = match self.regions.first() {
            Some(region) => region.color,
            None => return [0, 0, 0, 0],
        };
        for region in &self.regions {
            if height >= region.height {
                color = region.color;
            } else {
                break;
            }
        }
        color
    }

    /// Classify the `inner` x `inner` cells of `map` starting at `(border, border)`.
    ///
    /// Output is row-major, `inner * inner` long.
    pub fn color_map(&self, map: &HeightMap, border: usize, inner: usize) -> Vec<Color> {
        let mut colors = Vec::with_capacity(inner * inner);
        for y in 0..inner {
            for x in 0..inner {
                colors.push(self.classify(map.get(x + border, y + border)));
            }
        }
        colors
    }
}
