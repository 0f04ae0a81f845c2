//! Heightfield to mesh conversion at a given simplification level
//!
//! The input grid carries one extra sample on every side. Those border
//! samples become border vertices: they take part in normal calculation so
//! that vertices on the chunk edge are shaded exactly as if the neighbouring
//! chunk's surface were present, but they are never part of the output mesh.

use glam::{Vec2, Vec3};

use super::curve::HeightCurve;
use super::payload::MeshPayload;
use crate::heightfield::HeightMap;
use crate::streaming::lod::simplification_stride;

/// Visible vertices per side for a bordered grid of `bordered_size` samples
/// at simplification `lod`.
///
/// # Examples
/// ```
/// use terrain_stream::mesh::vertices_per_line;
///
/// assert_eq!(vertices_per_line(241, 0), 239);
/// assert_eq!(vertices_per_line(241, 1), 119);
/// assert_eq!(vertices_per_line(241, 2), 59);
/// ```
pub fn vertices_per_line(bordered_size: usize, lod: u32) -> usize {
    let stride = simplification_stride(lod);
    let mesh_size = bordered_size.saturating_sub(2 * stride);
    if mesh_size == 0 {
        return 0;
    }
    (mesh_size - 1) / stride + 1
}

/// Build the chunk mesh for `elevation` at simplification level `lod`.
///
/// Deterministic and free of shared state; safe to run on any worker.
/// `bordered_size - 1` should be a multiple of the stride for `lod` so that the
/// far border row and column are sampled.
pub fn build_terrain_mesh(
    elevation: &HeightMap,
    height_multiplier: f32,
    height_curve: &HeightCurve,
    lod: u32,
) -> MeshPayload {
    let stride = simplification_stride(lod);
    let bordered_size = elevation.size();
    let last = bordered_size.saturating_sub(1);
    // Visible extent measured at full resolution, independent of stride
    let unsimplified = bordered_size.saturating_sub(2);
    let span = unsimplified.saturating_sub(1).max(1) as f32;
    // Distance between the first and last sampled interior cell at this stride
    let mesh_span = last.saturating_sub(2 * stride).max(1) as f32;

    let half_width = (unsimplified as f32 - 1.0) / -2.0;
    let half_height = (unsimplified as f32 - 1.0) / 2.0;

    let mut mesh = MeshPayload::with_capacity(vertices_per_line(bordered_size, lod));

    // Pass 1: hand out indices in scan order
    let mut index_map = vec![0i32; bordered_size * bordered_size];
    let mut mesh_index = 0i32;
    let mut border_index = -1i32;
    for y in (0..bordered_size).step_by(stride) {
        for x in (0..bordered_size).step_by(stride) {
            let is_border = x == 0 || y == 0 || x == last || y == last;
            let slot = &mut index_map[y * bordered_size + x];
            if is_border {
                *slot = border_index;
                border_index -= 1;
            } else {
                *slot = mesh_index;
                mesh_index += 1;
            }
        }
    }

    // Pass 2: place vertices and stitch quads
    for y in (0..bordered_size).step_by(stride) {
        for x in (0..bordered_size).step_by(stride) {
            let index = index_map[y * bordered_size + x];

            // Fraction across the visible area; border samples fall just outside 0..1.
            // Every LOD stretches to the same extent so neighbouring chunks meet.
            let percent = Vec2::new(
                (x as f32 - stride as f32) / mesh_span,
                (y as f32 - stride as f32) / mesh_span,
            );
            let height = height_curve.evaluate(elevation.get(x, y)) * height_multiplier;
            let position = Vec3::new(
                half_width + percent.x * span,
                height,
                half_height - percent.y * span,
            );
            mesh.add_vertex(position, percent, index);

            if x + stride <= last && y + stride <= last {
                let a = index;
                let b = index_map[y * bordered_size + x + stride];
                let c = index_map[(y + stride) * bordered_size + x];
                let d = index_map[(y + stride) * bordered_size + x + stride];
                mesh.add_triangle(a, d, c);
                mesh.add_triangle(d, a, b);
            }
        }
    }

    mesh.bake_normals();
    mesh
}
