//! CPU-side terrain textures built from colour and height maps

use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::core::{Error, Result};
use crate::heightfield::{Color, HeightMap};

/// Point-sampled RGBA texture. Cheap to clone; the pixels are shared.
#[derive(Clone, Debug)]
pub struct TerrainTexture {
    image: Arc<RgbaImage>,
}

impl TerrainTexture {
    /// Texture from a row-major colour map of `width * height` entries
    pub fn from_color_map(colors: &[Color], width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if colors.len() != expected {
            return Err(Error::Generation(format!(
                "colour map has {} entries, expected {}x{}",
                colors.len(),
                width,
                height
            )));
        }
        let raw: Vec<u8> = colors.iter().flatten().copied().collect();
        let image = RgbaImage::from_raw(width, height, raw)
            .ok_or_else(|| Error::Generation("colour map does not fit texture".into()))?;
        Ok(Self { image: Arc::new(image) })
    }

    /// Greyscale preview of a height map: 0 is black, 1 is white
    pub fn from_height_map(map: &HeightMap) -> Self {
        let size = map.size() as u32;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let v = (map.get(x as usize, y as usize).clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgba([v, v, v, 255])
        });
        Self { image: Arc::new(image) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.image.get_pixel(x, y).0
    }

    /// Raw RGBA8 bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Write the texture to an image file; format follows the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path.as_ref())?;
        log::debug!("Saved {}x{} texture to {}", self.width(), self.height(), path.as_ref().display());
        Ok(())
    }
}
