//! Level of Detail (LOD) table for distance-based mesh simplification
//!
//! Each table entry pairs a mesh simplification level with the distance up to
//! which it is used. Entries are ordered by ascending distance; the last
//! entry's distance is also the global view distance, beyond which chunks are
//! hidden.

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Highest supported simplification level.
///
/// With the default chunk size of 239 the bordered grid spans 240 cells, which
/// every stride up to 12 (level 6) divides evenly.
pub const MAX_SIMPLIFICATION: u32 = 6;

/// One row of the LOD table
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    /// Simplification level; 0 is full detail
    pub lod: u32,
    /// Chunks up to this far away (from their nearest edge) use this level
    pub visible_distance: f32,
}

impl LodLevel {
    pub fn new(lod: u32, visible_distance: f32) -> Self {
        Self { lod, visible_distance }
    }

    /// Sample step through the height grid for this level
    pub fn stride(&self) -> usize {
        simplification_stride(self.lod)
    }
}

/// Sample step for a simplification level: 1 at level 0, else `2 * lod`
///
/// # Examples
/// ```
/// use terrain_stream::streaming::lod::simplification_stride;
///
/// assert_eq!(simplification_stride(0), 1);
/// assert_eq!(simplification_stride(1), 2);
/// assert_eq!(simplification_stride(4), 8);
/// ```
pub fn simplification_stride(lod: u32) -> usize {
    if lod == 0 { 1 } else { lod as usize * 2 }
}

/// Default table: full detail close by, progressively coarser further out
pub fn default_levels() -> Vec<LodLevel> {
    vec![
        LodLevel::new(0, 200.0),
        LodLevel::new(1, 400.0),
        LodLevel::new(4, 600.0),
    ]
}

/// Validated, non-empty LOD table with strictly increasing distances
#[derive(Clone, Debug, PartialEq)]
pub struct LodTable {
    levels: Vec<LodLevel>,
}

impl Default for LodTable {
    fn default() -> Self {
        Self { levels: default_levels() }
    }
}

impl LodTable {
    /// Build a table, rejecting empty or non-increasing input
    pub fn new(levels: Vec<LodLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::Config("LOD table must have at least one level".into()));
        }
        for pair in levels.windows(2) {
            if pair[1].visible_distance <= pair[0].visible_distance {
                return Err(Error::Config(format!(
                    "LOD distances must be strictly increasing ({} then {})",
                    pair[0].visible_distance, pair[1].visible_distance
                )));
            }
        }
        if let Some(level) = levels.iter().find(|l| l.lod > MAX_SIMPLIFICATION) {
            return Err(Error::Config(format!(
                "LOD simplification {} exceeds maximum {}",
                level.lod, MAX_SIMPLIFICATION
            )));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LodLevel> {
        self.levels.get(index)
    }

    /// Distance of the coarsest level; chunks further away are hidden
    pub fn max_view_distance(&self) -> f32 {
        self.levels.last().map_or(0.0, |l| l.visible_distance)
    }

    /// Table index for a chunk `distance` away.
    ///
    /// Walks the table and keeps advancing while the current level's distance
    /// has been exceeded, so the result is the largest index `i` with
    /// `levels[i - 1].visible_distance < distance`, or 0 when none is exceeded.
    pub fn select(&self, distance: f32) -> usize {
        let mut index = 0;
        for (i, level) in self.levels.iter().enumerate().take(self.levels.len().saturating_sub(1)) {
            if level.visible_distance < distance {
                index = i + 1;
            } else {
                break;
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LodTable {
        LodTable::new(vec![
            LodLevel::new(0, 100.0),
            LodLevel::new(1, 200.0),
            LodLevel::new(2, 300.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_stride() {
        assert_eq!(LodLevel::new(0, 1.0).stride(), 1);
        assert_eq!(LodLevel::new(1, 1.0).stride(), 2);
        assert_eq!(LodLevel::new(3, 1.0).stride(), 6);
        assert_eq!(LodLevel::new(6, 1.0).stride(), 12);
    }

    #[test]
    fn test_strides_divide_default_grid() {
        // 239 interior + 2 border samples = 240 cells
        for lod in 0..=MAX_SIMPLIFICATION {
            assert_eq!(240 % simplification_stride(lod), 0, "lod {}", lod);
        }
    }

    #[test]
    fn test_select() {
        let t = table();
        assert_eq!(t.select(0.0), 0);
        assert_eq!(t.select(100.0), 0);
        assert_eq!(t.select(100.5), 1);
        assert_eq!(t.select(200.0), 1);
        assert_eq!(t.select(250.0), 2);
        // Never past the last level
        assert_eq!(t.select(10_000.0), 2);
    }

    #[test]
    fn test_select_single_level() {
        let t = LodTable::new(vec![LodLevel::new(0, 100.0)]).unwrap();
        assert_eq!(t.select(0.0), 0);
        assert_eq!(t.select(1000.0), 0);
    }

    #[test]
    fn test_select_matches_definition() {
        let t = table();
        for step in 0..400 {
            let distance = step as f32;
            let expected = (1..t.len())
                .filter(|&i| t.levels()[i - 1].visible_distance < distance)
                .max()
                .unwrap_or(0);
            assert_eq!(t.select(distance), expected, "distance {}", distance);
        }
    }

    #[test]
    fn test_select_monotonicity() {
        let t = table();
        let mut prev = 0;
        for step in 0..1000 {
            let lod = t.select(step as f32 * 0.5);
            assert!(lod >= prev, "LOD index should never decrease with distance");
            prev = lod;
        }
    }

    #[test]
    fn test_max_view_distance() {
        assert_eq!(table().max_view_distance(), 300.0);
        assert_eq!(LodTable::default().max_view_distance(), 600.0);
    }

    #[test]
    fn test_rejects_invalid_tables() {
        assert!(LodTable::new(Vec::new()).is_err());
        assert!(LodTable::new(vec![LodLevel::new(0, 100.0), LodLevel::new(1, 100.0)]).is_err());
        assert!(LodTable::new(vec![LodLevel::new(0, 100.0), LodLevel::new(1, 50.0)]).is_err());
        assert!(LodTable::new(vec![LodLevel::new(MAX_SIMPLIFICATION + 1, 100.0)]).is_err());
    }
}
