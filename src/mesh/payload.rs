//! Terrain mesh payload
//!
//! Vertices are addressed with signed indices while the mesh is assembled:
//! non-negative indices are visible vertices, negative indices (`-1, -2, ...`)
//! are border vertices sampled one step outside the chunk. Border geometry
//! only feeds normal calculation and is never exposed.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved vertex for render sinks that upload one buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Finished chunk mesh at one LOD. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct MeshPayload {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    border_vertices: Vec<Vec3>,
    border_triangles: Vec<[i32; 3]>,
}

impl MeshPayload {
    /// Empty payload sized for `vertices_per_line`² visible vertices
    pub(crate) fn with_capacity(vertices_per_line: usize) -> Self {
        let count = vertices_per_line * vertices_per_line;
        let quads = vertices_per_line.saturating_sub(1).pow(2);
        Self {
            vertices: Vec::with_capacity(count),
            uvs: Vec::with_capacity(count),
            triangles: Vec::with_capacity(quads * 2),
            normals: Vec::new(),
            border_vertices: Vec::with_capacity(vertices_per_line * 4 + 4),
            border_triangles: Vec::with_capacity(vertices_per_line * 8),
        }
    }

    /// Store a vertex under its signed index.
    ///
    /// Indices must arrive in the order they were handed out: `0, 1, 2, ...`
    /// for visible vertices and `-1, -2, ...` for border vertices.
    pub(crate) fn add_vertex(&mut self, position: Vec3, uv: Vec2, index: i32) {
        if index < 0 {
            debug_assert_eq!(self.border_vertices.len(), (-index - 1) as usize);
            self.border_vertices.push(position);
        } else {
            debug_assert_eq!(self.vertices.len(), index as usize);
            self.vertices.push(position);
            self.uvs.push(uv);
        }
    }

    /// Route a triangle to the visible or the border list
    pub(crate) fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.border_triangles.push([a, b, c]);
        } else {
            self.triangles.push([a as u32, b as u32, c as u32]);
        }
    }

    fn position(&self, index: i32) -> Vec3 {
        if index < 0 {
            self.border_vertices[(-index - 1) as usize]
        } else {
            self.vertices[index as usize]
        }
    }

    fn surface_normal(&self, a: i32, b: i32, c: i32) -> Vec3 {
        let pa = self.position(a);
        let ab = self.position(b) - pa;
        let ac = self.position(c) - pa;
        ab.cross(ac).normalize_or_zero()
    }

    /// Compute per-vertex normals from visible and border triangles.
    ///
    /// Border triangles add their face normal to whichever of their corners
    /// are visible, so edge vertices get the same normal the neighbouring
    /// chunk computes for them.
    pub(crate) fn bake_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for &[a, b, c] in &self.triangles {
            let n = self.surface_normal(a as i32, b as i32, c as i32);
            normals[a as usize] += n;
            normals[b as usize] += n;
            normals[c as usize] += n;
        }

        for &[a, b, c] in &self.border_triangles {
            let n = self.surface_normal(a, b, c);
            for index in [a, b, c] {
                if index >= 0 {
                    normals[index as usize] += n;
                }
            }
        }

        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Triangle list flattened into an index buffer
    pub fn indices(&self) -> Vec<u32> {
        self.triangles.iter().flatten().copied().collect()
    }

    /// Vertices interleaved with their normal and uv
    pub fn interleaved(&self) -> Vec<TerrainVertex> {
        self.vertices
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| TerrainVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn border_vertex_count(&self) -> usize {
        self.border_vertices.len()
    }

    #[cfg(test)]
    pub(crate) fn border_triangle_count(&self) -> usize {
        self.border_triangles.len()
    }
}
