//! Single-chunk previews for tuning a config without streaming
//!
//! Generates the chunk at the world origin and renders one view of it.

use std::path::Path;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::TerrainConfig;
use crate::core::{Error, Result};
use crate::heightfield::{HeightfieldProvider, NoiseHeightfieldProvider, generate_falloff_map};
use crate::mesh::{MeshPayload, build_terrain_mesh};
use crate::texture::TerrainTexture;

/// What to render
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawMode {
    /// Raw elevation as greyscale
    NoiseMap,
    /// Region colours
    #[default]
    ColorMap,
    /// Mesh at the preview LOD, coloured by region
    Mesh,
    /// The island falloff mask on its own
    FalloffMap,
}

impl FromStr for DrawMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "noise" | "noise_map" => Ok(DrawMode::NoiseMap),
            "color" | "colour" | "color_map" => Ok(DrawMode::ColorMap),
            "mesh" => Ok(DrawMode::Mesh),
            "falloff" | "falloff_map" => Ok(DrawMode::FalloffMap),
            other => Err(Error::Config(format!("unknown draw mode '{}'", other))),
        }
    }
}

pub enum Preview {
    Texture(TerrainTexture),
    Mesh {
        mesh: MeshPayload,
        texture: TerrainTexture,
    },
}

impl Preview {
    pub fn texture(&self) -> &TerrainTexture {
        match self {
            Preview::Texture(texture) | Preview::Mesh { texture, .. } => texture,
        }
    }

    pub fn mesh(&self) -> Option<&MeshPayload> {
        match self {
            Preview::Mesh { mesh, .. } => Some(mesh),
            Preview::Texture(_) => None,
        }
    }

    /// Write the preview texture as an image file (PNG by extension)
    pub fn save_texture(&self, path: impl AsRef<Path>) -> Result<()> {
        self.texture().save(path)
    }
}

/// Render the origin chunk of `config` in `mode`
pub fn render_preview(config: &TerrainConfig, mode: DrawMode) -> Result<Preview> {
    let size = config.chunk_size as u32;
    let origin = || NoiseHeightfieldProvider::new(config).generate(Vec2::ZERO);

    let preview = match mode {
        DrawMode::NoiseMap => Preview::Texture(TerrainTexture::from_height_map(&origin()?.elevation)),
        DrawMode::ColorMap => {
            let data = origin()?;
            Preview::Texture(TerrainTexture::from_color_map(&data.colors, size, size)?)
        }
        DrawMode::Mesh => {
            let data = origin()?;
            Preview::Mesh {
                mesh: build_terrain_mesh(
                    &data.elevation,
                    config.height_multiplier,
                    &config.height_curve,
                    config.editor_preview_lod,
                ),
                texture: TerrainTexture::from_color_map(&data.colors, size, size)?,
            }
        }
        DrawMode::FalloffMap => {
            Preview::Texture(TerrainTexture::from_height_map(&generate_falloff_map(config.chunk_size)))
        }
    };

    log::debug!("Rendered {:?} preview", mode);
    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::vertices_per_line;

    fn config() -> TerrainConfig {
        TerrainConfig {
            chunk_size: 47,
            editor_preview_lod: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_draw_mode() {
        assert_eq!("mesh".parse::<DrawMode>().unwrap(), DrawMode::Mesh);
        assert_eq!("Colour".parse::<DrawMode>().unwrap(), DrawMode::ColorMap);
        assert_eq!("falloff_map".parse::<DrawMode>().unwrap(), DrawMode::FalloffMap);
        assert!("sky".parse::<DrawMode>().is_err());
    }

    #[test]
    fn test_texture_sizes() {
        let config = config();
        let noise = render_preview(&config, DrawMode::NoiseMap).unwrap();
        assert_eq!(noise.texture().width(), 49);
        assert!(noise.mesh().is_none());

        let colors = render_preview(&config, DrawMode::ColorMap).unwrap();
        assert_eq!(colors.texture().width(), 47);

        let falloff = render_preview(&config, DrawMode::FalloffMap).unwrap();
        assert_eq!(falloff.texture().height(), 47);
        // Falloff is black in the middle and white in the corners
        assert_eq!(falloff.texture().pixel(23, 23), [0, 0, 0, 255]);
        assert_eq!(falloff.texture().pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_mesh_uses_preview_lod() {
        let config = config();
        let preview = render_preview(&config, DrawMode::Mesh).unwrap();
        let mesh = preview.mesh().unwrap();
        let vpl = vertices_per_line(49, 2);
        assert_eq!(mesh.vertex_count(), vpl * vpl);
        assert_eq!(preview.texture().width(), 47);
    }

    #[test]
    fn test_save_texture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        render_preview(&config(), DrawMode::ColorMap).unwrap().save_texture(&path).unwrap();
        assert!(path.exists());
    }
}
