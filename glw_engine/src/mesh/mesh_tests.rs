//! Unit tests for mesh.rs

use super::*;
use crate::device::HeadlessDevice;
use crate::stream::Vertex;
use glam::Vec4;

// ============================================================================
// HELPERS
// ============================================================================

fn quad() -> Mesh {
    let vertices = VertexStream::from_positions(&[
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ]);
    Mesh::new(vertices)
        .with_index(IndexStream::from_indices(Primitive::Triangles, vec![0, 1, 2, 0, 2, 3]))
        .with_shaders(ShaderMask::SOLID)
}

fn loaded_shader(device: &mut HeadlessDevice) -> Shader {
    let mut shader = Shader::new("shader", "solid.vsh", "solid.fsh").with_mask(ShaderMask::SOLID);
    shader.load(device).unwrap();
    shader.use_program(device).unwrap();
    shader
}

fn context<'a>(tier: CapabilityTier, shader: &'a Shader) -> DrawContext<'a> {
    DrawContext {
        tier,
        shader,
        model: Mat4::IDENTITY,
        view: Mat4::IDENTITY,
        screen: (8, 8),
        texture: None,
        picking: None,
    }
}

fn assert_mat_eq(a: Mat4, b: Mat4) {
    assert!(a.abs_diff_eq(b, 1e-5), "{:?} != {:?}", a, b);
}

// ============================================================================
// DEFAULTS & TRANSFORMS
// ============================================================================

#[test]
fn test_defaults() {
    let mesh = Mesh::new(VertexStream::new());
    assert_eq!(mesh.show(), 1);
    assert_eq!(mesh.scale(), Vec3::ONE);
    assert_eq!(mesh.primary(), Color::rgba(0, 0, 0, 255));
    assert_eq!(mesh.secondary(), Color::rgba(255, 255, 255, 0));
    assert_eq!(mesh.point_size(), 5.0);
    assert_eq!(mesh.line_width(), 1.0);
    assert_eq!(mesh.scalar_range(), Vec2::new(0.0, 1.0));
    assert_eq!(mesh.texture_blend(), 1.0);
    assert_eq!(mesh.picking_id(), 0);
    assert!(mesh.parent().is_none());
}

#[test]
fn test_local_matrix_order() {
    let mut mesh = quad();
    mesh.set_position(Vec3::new(1.0, 2.0, 3.0));
    mesh.set_rotation(Vec3::new(10.0, 20.0, 30.0));
    mesh.set_scale(Vec3::new(1.0, 2.0, 3.0));
    mesh.set_size(2.0);

    let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
        * Mat4::from_rotation_z(30f32.to_radians())
        * Mat4::from_rotation_y(20f32.to_radians())
        * Mat4::from_rotation_x(10f32.to_radians())
        * Mat4::from_scale(Vec3::new(2.0, 4.0, 6.0));
    assert_mat_eq(mesh.local_matrix(), expected);
}

#[test]
fn test_blit_offset_uses_screen_width() {
    let mut mesh = quad();
    mesh.set_blit(Vec3::new(100.0, 50.0, 0.25));
    let matrix = mesh.transformation_matrix((200, 100));
    assert!((matrix.w_axis.x - 1.0).abs() < 1e-6);
    assert!((matrix.w_axis.y - 0.5).abs() < 1e-6);
    assert!((matrix.w_axis.z - 0.25).abs() < 1e-6);
}

#[test]
fn test_bounds_under_model_matrix() {
    let mesh = quad();
    let (min, max) = mesh.bounds(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))).unwrap();
    assert_eq!(min, Vec3::new(4.0, -1.0, 0.0));
    assert_eq!(max, Vec3::new(6.0, 1.0, 0.0));
    assert!(Mesh::new(VertexStream::new()).bounds(Mat4::IDENTITY).is_none());
}

// ============================================================================
// NORMALS
// ============================================================================

#[test]
fn test_calculate_normals_on_triangles() {
    let mut mesh = quad();
    mesh.calculate_normals().unwrap();
    for vertex in mesh.vertices().as_slice() {
        assert!((vertex.normal - Vec3::Z).length() < 1e-6);
    }
    assert!(mesh.vertices().is_dirty());
}

#[test]
fn test_calculate_normals_rejects_other_primitives() {
    let mut mesh = quad();
    mesh.set_index(Some(IndexStream::from_indices(Primitive::Lines, vec![0, 1])));
    let before: Vec<Vertex> = mesh.vertices().as_slice().to_vec();
    assert!(matches!(mesh.calculate_normals(), Err(Error::UnsupportedPrimitive(_))));
    assert_eq!(mesh.vertices().as_slice(), before.as_slice());

    let mut bare = Mesh::new(VertexStream::from_positions(&[Vec3::ZERO]));
    assert!(bare.calculate_normals().is_err());
}

// ============================================================================
// POLYGON RULES
// ============================================================================

#[test]
fn test_polygon_and_depth_range_rules() {
    assert_eq!(polygon_for_primitive(None), PolygonMode::Point);
    assert_eq!(polygon_for_primitive(Some(Primitive::TriangleStrip)), PolygonMode::Fill);
    assert_eq!(polygon_for_primitive(Some(Primitive::LineLoop)), PolygonMode::Line);
    assert_eq!(depth_range_for(PolygonMode::Point), (0.0, 1.0 - 2.0 / 64.0));
    assert_eq!(depth_range_for(PolygonMode::Line), (0.0, 1.0 - 1.0 / 64.0));
    assert_eq!(depth_range_for(PolygonMode::Fill), (0.0, 1.0));

    let mesh = quad();
    let points = Shader::new("s", "a.vsh", "a.fsh").with_polygon(Some(PolygonMode::Point));
    assert_eq!(mesh.draw_primitive(&points), Primitive::Points);
    let derived = Shader::new("s", "a.vsh", "a.fsh");
    assert_eq!(mesh.polygon_for(&derived), PolygonMode::Fill);
    assert_eq!(mesh.draw_primitive(&derived), Primitive::Triangles);
}

#[test]
fn test_uniforms() {
    let mut mesh = quad();
    mesh.set_self_illumination(1.0);
    mesh.set_texture_blend(0.25);
    mesh.set_picking_id(3);
    let shader = Shader::new("s", "a.vsh", "a.fsh");

    let ctx = context(CapabilityTier::Modern, &shader);
    let uniforms = mesh.uniforms(&ctx);
    assert_eq!(uniforms.ambient_light.w, 1.0);
    assert_eq!(uniforms.texture_blend, 1.0);
    assert_eq!(uniforms.picking_id, 3);
    assert_eq!(uniforms.primary_color, Vec4::new(0.0, 0.0, 0.0, 1.0));
}

// ============================================================================
// DRAWING
// ============================================================================

#[test]
fn test_modern_draw_caches_vertex_array() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 8, 8);
    let shader = loaded_shader(&mut device);
    let mut mesh = quad();

    mesh.draw(&mut device, context(CapabilityTier::Modern, &shader)).unwrap();
    mesh.draw(&mut device, context(CapabilityTier::Modern, &shader)).unwrap();
    assert_eq!(device.stats().vertex_arrays_created, 1);
    assert!(!mesh.vertices().is_dirty());
    assert!(mesh.vertices().buffer().is_some());

    mesh.vertices_mut().alloc(5);
    mesh.draw(&mut device, context(CapabilityTier::Modern, &shader)).unwrap();
    assert_eq!(device.stats().vertex_arrays_created, 2);
    assert_eq!(device.stats().live_vertex_arrays, 1);
}

#[test]
fn test_programmable_draw_binds_attributes() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 8, 8);
    let shader = loaded_shader(&mut device);
    let mut mesh = quad().with_primary(Color::RED);

    mesh.draw(&mut device, context(CapabilityTier::Programmable, &shader)).unwrap();
    assert_eq!(device.stats().vertex_arrays_created, 0);
    assert_eq!(device.surface_pixel(4, 4), Some([255, 0, 0, 255]));
}

struct VertexCountAsLineWidth;

impl crate::shader::LegacyRenderer for VertexCountAsLineWidth {
    fn draw(&self, draw: &mut LegacyDraw<'_>) -> Result<()> {
        draw.device.set_line_width(draw.mesh.vertices().len() as f32);
        Ok(())
    }
}

#[test]
fn test_legacy_draw_uses_callback() {
    let mut device = HeadlessDevice::new(CapabilityTier::Legacy, 8, 8);
    let shader = Shader::legacy(VertexCountAsLineWidth);
    let mut mesh = quad();
    mesh.draw(&mut device, context(CapabilityTier::Legacy, &shader)).unwrap();
    assert_eq!(device.line_width(), 4.0);

    let plain = Shader::new("s", "a.vsh", "a.fsh");
    assert!(mesh.draw(&mut device, context(CapabilityTier::Legacy, &plain)).is_err());
}

#[test]
fn test_replaced_streams_are_released() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 8, 8);
    let mut mesh = quad();
    mesh.sync_streams(&mut device).unwrap();
    assert_eq!(device.stats().live_buffers, 2);

    mesh.set_index(Some(IndexStream::from_indices(Primitive::Triangles, vec![0, 1, 2])));
    mesh.sync_streams(&mut device).unwrap();
    assert_eq!(device.stats().live_buffers, 2);

    mesh.release(&mut device);
    assert_eq!(device.stats().live_buffers, 0);
    assert!(!mesh.has_gpu_objects());
}

// ============================================================================
// HANDLERS
// ============================================================================

struct Nothing;

impl MeshEventHandler for Nothing {}

#[test]
fn test_handler_registration() {
    let mut mesh = quad();
    let a = mesh.add_handler(Nothing);
    let b = mesh.add_handler(Nothing);
    assert_ne!(a, b);
    assert!(mesh.remove_handler(a));
    assert!(!mesh.remove_handler(a));
    assert_eq!(mesh.handler_count(), 1);

    let taken = mesh.take_handlers();
    mesh.add_handler(Nothing);
    mesh.restore_handlers(taken);
    assert_eq!(mesh.handler_count(), 2);
}
