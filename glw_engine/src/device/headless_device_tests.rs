//! Unit tests for headless_device.rs

use super::*;
use std::path::PathBuf;

// ============================================================================
// HELPERS
// ============================================================================

fn quad_positions(z: f32) -> Vec<u8> {
    let positions: [f32; 12] = [-1.0, -1.0, z, 1.0, -1.0, z, 1.0, 1.0, z, -1.0, 1.0, z];
    positions.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn quad_indices() -> Vec<u8> {
    [0u32, 1, 2, 0, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn source(vertex: &str, fragment: &str) -> ProgramSource {
    ProgramSource {
        vertex: PathBuf::from(vertex),
        fragment: PathBuf::from(fragment),
        geometry: None,
    }
}

/// Upload a full-screen quad and bind it without a vertex array
fn bind_quad(device: &mut HeadlessDevice, z: f32) -> (BufferId, BufferId) {
    let vbo = device.create_buffer(BufferTarget::Vertex, BufferUsage::Dynamic, &quad_positions(z)).unwrap();
    let ibo = device.create_buffer(BufferTarget::Index, BufferUsage::Static, &quad_indices()).unwrap();
    let attributes = [VertexAttribute { location: 0, buffer: &vbo, components: 3, stride: 12, offset: 0 }];
    device.bind_attributes(&attributes, Some(&ibo)).unwrap();
    (vbo, ibo)
}

// ============================================================================
// OBJECT LIFECYCLE
// ============================================================================

#[test]
fn test_buffer_stats() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let buffer = device.create_buffer(BufferTarget::Vertex, BufferUsage::Dynamic, &[0; 16]).unwrap();
    device.update_buffer(&buffer, 4, &[1; 8]).unwrap();
    assert!(device.update_buffer(&buffer, 12, &[1; 8]).is_err());
    assert_eq!(device.check_error(), 0x0501);
    assert_eq!(device.check_error(), 0);

    let stats = device.stats();
    assert_eq!(stats.live_buffers, 1);
    assert_eq!(stats.buffers_created, 1);
    assert_eq!(stats.buffer_updates, 1);

    device.delete_buffer(buffer);
    assert_eq!(device.stats().live_objects(), 0);
}

#[test]
fn test_versions_per_tier() {
    assert_eq!(HeadlessDevice::new(CapabilityTier::Legacy, 1, 1).version(), 15);
    assert_eq!(HeadlessDevice::new(CapabilityTier::Programmable, 1, 1).version(), 21);
    assert_eq!(HeadlessDevice::new(CapabilityTier::Modern, 1, 1).version(), 33);
    assert_eq!(HeadlessDevice::with_version(20, 1, 1).capability(), CapabilityTier::Programmable);
}

#[test]
fn test_framebuffer_requires_matching_sizes() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let color = device.create_texture(&TextureDesc::new(4, 4, TextureFormat::Rgba8), None).unwrap();
    let depth = device.create_renderbuffer(TextureFormat::Depth24Stencil8, 8, 8).unwrap();

    let result = device.create_framebuffer(&[
        FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(&color) },
        FramebufferAttachment { point: AttachmentPoint::DepthStencil, source: AttachmentSource::Renderbuffer(&depth) },
    ]);
    assert!(result.is_err());
    assert!(device.create_framebuffer(&[]).is_err());
}

#[test]
fn test_link_failure_is_shader_load_error() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    device.fail_program_link("broken");
    match device.create_program(&source("shader/broken.vsh", "shader/broken.fsh"), &[]) {
        Err(Error::ShaderLoad { status, files }) => {
            assert_eq!(status, 8);
            assert!(files.contains("broken.fsh"));
        }
        other => panic!("unexpected {:?}", other.map(|p| p.raw())),
    }
    assert_eq!(device.stats().live_programs, 0);
}

// ============================================================================
// DRAWING
// ============================================================================

#[test]
fn test_flat_color_quad_fills_surface() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 8, 6);
    let program = device.create_program(&source("flat.vsh", "flat.fsh"), &[("in_Position", 0)]).unwrap();
    device.use_program(Some(&program));
    let color = device.uniform_location(&program, "PrimaryColor").unwrap();
    device.set_uniform(color, UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    let _quad = bind_quad(&mut device, 0.0);

    device.draw_elements(Primitive::Triangles, 6).unwrap();

    assert_eq!(device.surface_pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(device.surface_pixel(7, 5), Some([255, 0, 0, 255]));
    assert_eq!(device.stats().draw_calls, 1);
}

#[test]
fn test_picking_program_writes_integer_ids() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let entity = device.create_texture(&TextureDesc::new(4, 4, TextureFormat::R32Uint), None).unwrap();
    let vertex = device.create_texture(&TextureDesc::new(4, 4, TextureFormat::R32Uint), None).unwrap();
    let depth = device.create_renderbuffer(TextureFormat::Depth, 4, 4).unwrap();
    let fbo = device
        .create_framebuffer(&[
            FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(&entity) },
            FramebufferAttachment { point: AttachmentPoint::Color(1), source: AttachmentSource::Texture(&vertex) },
            FramebufferAttachment { point: AttachmentPoint::Depth, source: AttachmentSource::Renderbuffer(&depth) },
        ])
        .unwrap();

    let program = device.create_program(&source("picking.vsh", "picking.fsh"), &[]).unwrap();
    device.bind_framebuffer(Some(&fbo));
    device.set_draw_buffers(2);
    device.set_depth_test(true);
    device.clear(ClearFlags::DEPTH, ClearValues::default());
    device.use_program(Some(&program));
    let id = device.uniform_location(&program, "PickingId").unwrap();
    device.set_uniform(id, UniformValue::Int(42));
    let _quad = bind_quad(&mut device, 0.0);
    device.draw_elements(Primitive::Triangles, 6).unwrap();

    let ids = device.read_integer(Some(&fbo), 0, Rect::new(1, 1, 1, 1)).unwrap();
    assert_eq!(ids, vec![42]);
    let vertices = device.read_integer(Some(&fbo), 1, Rect::new(0, 0, 1, 1)).unwrap();
    assert_eq!(vertices, vec![0]);
    let depths = device.read_depth(Some(&fbo), Rect::new(2, 2, 1, 1)).unwrap();
    assert!((depths[0] - 0.5).abs() < 1e-6);
}

#[test]
fn test_depth_test_keeps_nearest() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 2, 2);
    let program = device.create_program(&source("flat.vsh", "flat.fsh"), &[]).unwrap();
    device.use_program(Some(&program));
    device.set_depth_test(true);
    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, ClearValues::default());
    let color = device.uniform_location(&program, "PrimaryColor").unwrap();

    device.set_uniform(color, UniformValue::Vec4(Vec4::new(0.0, 1.0, 0.0, 1.0)));
    let _near = bind_quad(&mut device, -0.5);
    device.draw_elements(Primitive::Triangles, 6).unwrap();

    device.set_uniform(color, UniformValue::Vec4(Vec4::new(0.0, 0.0, 1.0, 1.0)));
    let _far = bind_quad(&mut device, 0.5);
    device.draw_elements(Primitive::Triangles, 6).unwrap();

    assert_eq!(device.surface_pixel(1, 1), Some([0, 255, 0, 255]));
}

#[test]
fn test_stencil_equal_restricts_draw() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let program = device.create_program(&source("flat.vsh", "flat.fsh"), &[]).unwrap();
    device.use_program(Some(&program));
    device.clear(ClearFlags::COLOR | ClearFlags::STENCIL, ClearValues::default());

    device.set_stencil(Some(StencilState::tag(1)));
    device.set_scissor(Some(Rect::new(0, 0, 2, 4)));
    let _quad = bind_quad(&mut device, 0.0);
    device.draw_elements(Primitive::Triangles, 6).unwrap();

    device.set_scissor(None);
    device.set_stencil(Some(StencilState::equal(1)));
    let color = device.uniform_location(&program, "PrimaryColor").unwrap();
    device.set_uniform(color, UniformValue::Vec4(Vec4::new(1.0, 0.0, 1.0, 1.0)));
    device.draw_elements(Primitive::Triangles, 6).unwrap();

    assert_eq!(device.surface_pixel(1, 1), Some([255, 0, 255, 255]));
    assert_eq!(device.surface_pixel(3, 1), Some([0, 0, 0, 0]));
}

#[test]
fn test_blit_copies_color() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 2, 2);
    let color = device.create_texture(&TextureDesc::new(2, 2, TextureFormat::Rgba8), None).unwrap();
    let fbo = device
        .create_framebuffer(&[FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(&color) }])
        .unwrap();
    device.clear(ClearFlags::COLOR, ClearValues::color(Vec4::new(0.0, 0.0, 1.0, 1.0)));

    device
        .blit_framebuffer(None, Rect::full(2, 2), Some(&fbo), Rect::full(2, 2), ClearFlags::COLOR)
        .unwrap();

    let bgra = device.read_color_bgra8(Some(&fbo), Rect::new(0, 0, 1, 1)).unwrap();
    assert_eq!(bgra, vec![255, 0, 0, 255]);
}

#[test]
fn test_read_outside_surface_fails() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 2, 2);
    assert!(device.read_depth(None, Rect::new(1, 1, 2, 2)).is_err());
    assert_eq!(device.check_error(), 0x0501);
}

#[test]
fn test_resize_surface_keeps_object_counts() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 2, 2);
    device.resize_surface(10, 20);
    assert_eq!(device.surface_size(), (10, 20));
    assert_eq!(device.stats().live_objects(), 0);
}
