/// Edge-function rasterizer used by the headless device

use glam::Vec2;
use super::types::{CullFace, Rect};

/// Vertex after the viewport transform (window coordinates, y up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WindowVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub uv: Vec2,
    /// Index of the source vertex in the vertex stream
    pub id: u32,
}

/// Covered pixel produced by rasterization
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Fragment {
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub uv: Vec2,
    pub vertex_id: u32,
}

fn edge(a: &WindowVertex, b: &WindowVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Signed doubled area; positive for counter-clockwise (front-facing) triangles
pub(crate) fn signed_area(v: &[WindowVertex; 3]) -> f32 {
    edge(&v[0], &v[1], v[2].x, v[2].y)
}

/// Whether culling discards a triangle with this signed area
pub(crate) fn is_culled(area: f32, cull: Option<CullFace>) -> bool {
    match cull {
        Some(CullFace::Back) => area < 0.0,
        Some(CullFace::Front) => area > 0.0,
        None => false,
    }
}

/// Pixels whose centers lie inside the triangle, clipped to `bounds`
///
/// The sub-element id of a fragment is the vertex with the largest
/// barycentric weight.
pub(crate) fn rasterize_triangle(v: [WindowVertex; 3], bounds: Rect, out: &mut impl FnMut(Fragment)) {
    let area = signed_area(&v);
    if area == 0.0 || !area.is_finite() {
        return;
    }

    let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor() as i32;
    let max_x = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;
    let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor() as i32;
    let max_y = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

    let x0 = min_x.max(bounds.x);
    let x1 = max_x.min(bounds.x + bounds.width);
    let y0 = min_y.max(bounds.y);
    let y1 = max_y.min(bounds.y + bounds.height);

    for y in y0..y1 {
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let w0 = edge(&v[1], &v[2], px, py) / area;
            let w1 = edge(&v[2], &v[0], px, py) / area;
            let w2 = edge(&v[0], &v[1], px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let weights = [w0, w1, w2];
            let mut nearest = 0;
            for i in 1..3 {
                if weights[i] > weights[nearest] {
                    nearest = i;
                }
            }

            out(Fragment {
                x,
                y,
                z: w0 * v[0].z + w1 * v[1].z + w2 * v[2].z,
                uv: v[0].uv * w0 + v[1].uv * w1 + v[2].uv * w2,
                vertex_id: v[nearest].id,
            });
        }
    }
}

/// One-pixel wide DDA line, endpoints included
pub(crate) fn rasterize_line(a: WindowVertex, b: WindowVertex, bounds: Rect, out: &mut impl FnMut(Fragment)) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
    let mut last: Option<(i32, i32)> = None;

    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (a.x + dx * t).floor() as i32;
        let y = (a.y + dy * t).floor() as i32;
        if last == Some((x, y)) || !bounds.contains(x, y) {
            continue;
        }
        last = Some((x, y));
        out(Fragment {
            x,
            y,
            z: a.z + (b.z - a.z) * t,
            uv: a.uv.lerp(b.uv, t),
            vertex_id: if t < 0.5 { a.id } else { b.id },
        });
    }
}

/// Square point of `size` pixels centered on the vertex
pub(crate) fn rasterize_point(v: WindowVertex, size: f32, bounds: Rect, out: &mut impl FnMut(Fragment)) {
    let side = size.round().max(1.0) as i32;
    let x0 = (v.x - size.max(1.0) / 2.0).floor() as i32;
    let y0 = (v.y - size.max(1.0) / 2.0).floor() as i32;
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            if bounds.contains(x, y) {
                out(Fragment { x, y, z: v.z, uv: v.uv, vertex_id: v.id });
            }
        }
    }
}

#[cfg(test)]
#[path = "raster_tests.rs"]
mod tests;
