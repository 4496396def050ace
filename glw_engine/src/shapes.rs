//! Ready-made meshes

use glam::{Vec2, Vec3};
use crate::device::Primitive;
use crate::mesh::Mesh;
use crate::stream::{IndexStream, Vertex, VertexStream};

/// Two-triangle quad from (0,0) to (w,h) in the z = 0 plane, uv 0..1
fn quad(width: f32, height: f32) -> Mesh {
    let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    let vertices = corners
        .iter()
        .map(|&(u, v)| Vertex::new(Vec3::new(u * width, v * height, 0.0), Vec3::Z, Vec2::new(u, v)))
        .collect();
    Mesh::new(VertexStream::from_vec(vertices))
        .with_index(IndexStream::from_indices(Primitive::Triangles, vec![0, 1, 2, 0, 2, 3]))
}

/// Unit quad covering `[0,1]^2`, drawn full-screen by post-process passes
pub fn quad01() -> Mesh {
    quad(1.0, 1.0).with_label("quad01")
}

/// Quad of `width` x `height` units anchored at its lower-left corner
pub fn sprite(width: f32, height: f32) -> Mesh {
    quad(width, height).with_label("sprite")
}

/// Cube of edge `size` centred on the origin
///
/// Each face has its own four vertices so normals and texture
/// coordinates stay per-face: 24 vertices, 12 triangles.
pub fn cube(size: f32) -> Mesh {
    let half = size / 2.0;
    // (normal, u axis, v axis)
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::NEG_Y, Vec3::Z),
        (Vec3::Y, Vec3::NEG_X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u_axis, v_axis) in faces {
        let base = vertices.len() as u32;
        for (u, v) in [(0.0f32, 0.0f32), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let position = (normal + u_axis * (2.0 * u - 1.0) + v_axis * (2.0 * v - 1.0)) * half;
            vertices.push(Vertex::new(position, normal, Vec2::new(u, v)));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh::new(VertexStream::from_vec(vertices))
        .with_index(IndexStream::from_indices(Primitive::Triangles, indices))
        .with_label("cube")
}

#[cfg(test)]
#[path = "shapes_tests.rs"]
mod tests;
