//! Unit tests for picking_buffer.rs

use super::*;
use crate::device::{BufferTarget, BufferUsage, HeadlessDevice, Primitive, ProgramSource, UniformValue, VertexAttribute};
use std::path::PathBuf;

// ============================================================================
// HELPERS
// ============================================================================

/// Draw a full-window quad at depth `z` with the picking program
fn draw_picking_quad(device: &mut HeadlessDevice, id: i32, z: f32) {
    let source = ProgramSource {
        vertex: PathBuf::from("picking.vsh"),
        fragment: PathBuf::from("picking.fsh"),
        geometry: None,
    };
    let program = device.create_program(&source, &[("in_Position", 0)]).unwrap();
    device.use_program(Some(&program));
    device.set_depth_test(true);
    let location = device.uniform_location(&program, "PickingId").unwrap();
    device.set_uniform(location, UniformValue::Int(id));

    let positions: [f32; 12] = [-1.0, -1.0, z, 1.0, -1.0, z, 1.0, 1.0, z, -1.0, 1.0, z];
    let bytes: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
    let indices: Vec<u8> = [0u32, 1, 2, 0, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
    let vbo = device.create_buffer(BufferTarget::Vertex, BufferUsage::Static, &bytes).unwrap();
    let ibo = device.create_buffer(BufferTarget::Index, BufferUsage::Static, &indices).unwrap();
    let attributes = [VertexAttribute { location: 0, buffer: &vbo, components: 3, stride: 12, offset: 0 }];
    device.bind_attributes(&attributes, Some(&ibo)).unwrap();
    device.draw_elements(Primitive::Triangles, 6).unwrap();
}

// ============================================================================
// SIZING
// ============================================================================

#[test]
fn test_variant_per_tier() {
    assert_eq!(PickingBuffer::for_tier(CapabilityTier::Legacy).tier(), CapabilityTier::Legacy);
    assert_eq!(PickingBuffer::for_tier(CapabilityTier::Programmable).tier(), CapabilityTier::Programmable);
    assert_eq!(PickingBuffer::for_tier(CapabilityTier::Modern).tier(), CapabilityTier::Modern);
    assert!(!PickingBuffer::for_tier(CapabilityTier::Modern).is_allocated());
}

#[test]
fn test_regenerate_same_size_is_noop() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 8, 8);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Modern);
    assert!(picking.regenerate(&mut device, 8, 8).unwrap());
    assert!(!picking.regenerate(&mut device, 8, 8).unwrap());
    assert_eq!(device.stats().framebuffers_created, 1);
    assert_eq!(picking.size(), (8, 8));

    assert!(picking.regenerate(&mut device, 4, 2).unwrap());
    let stats = device.stats();
    assert_eq!(stats.framebuffers_created, 2);
    assert_eq!(stats.live_framebuffers, 1);
    assert_eq!(stats.live_textures, 2);
    assert_eq!(stats.live_renderbuffers, 1);
}

#[test]
fn test_unsized_buffer_refuses_reads() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 4, 4);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Programmable);
    assert!(picking.read_pixel(&mut device, 0, 0).is_err());
    assert!(picking.read_box(&mut device, 0, 0, 1, 1).is_err());
    assert!(picking.clear(&mut device).is_err());
}

#[test]
fn test_release_frees_everything() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 4, 4);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Programmable);
    picking.regenerate(&mut device, 4, 4).unwrap();
    picking.release(&mut device);
    assert!(!picking.is_allocated());
    assert_eq!(device.stats().live_objects(), 0);
}

// ============================================================================
// READ-BACK
// ============================================================================

#[test]
fn test_cpu_tier_reads_written_id() {
    let mut device = HeadlessDevice::new(CapabilityTier::Legacy, 4, 4);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Legacy);
    picking.regenerate(&mut device, 4, 4).unwrap();
    picking.clear(&mut device).unwrap();
    picking.cpu_mut().unwrap().write_id(2, 1, 7).unwrap();

    let hit = picking.read_pixel(&mut device, 2, 1).unwrap();
    assert_eq!(hit.id, 7);
    assert_eq!(hit.vertex, None);
    assert_eq!(picking.read_pixel(&mut device, 1, 2).unwrap().id, 0);
    assert!(picking.read_pixel(&mut device, 4, 0).is_err());

    picking.cpu_mut().unwrap().write_id(0, 0, 1000).unwrap();
    assert_eq!(picking.read_pixel(&mut device, 0, 0).unwrap().id, 1000);
}

#[test]
fn test_rgba_id_encoding_spans_three_channels() {
    for id in [1, 255, 256, 1024, 0x12_34_56] {
        let [r, g, b, a] = rgba_from_id(id);
        assert_eq!(a, 255);
        assert_eq!(id_from_bgra(&[b, g, r, a]), id);
    }
    assert_ne!(rgba_from_id(257), rgba_from_id(1));
    assert_eq!(id_from_bgra(&[]), 0);
}

#[test]
fn test_rgba_tier_reads_full_id() {
    let mut device = HeadlessDevice::new(CapabilityTier::Programmable, 6, 4);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Programmable);
    picking.regenerate(&mut device, 6, 4).unwrap();
    picking.clear(&mut device).unwrap();
    assert_eq!(picking.read_pixel(&mut device, 3, 2).unwrap().id, 0);

    draw_picking_quad(&mut device, 0x1_05, 0.0);
    let hit = picking.read_pixel(&mut device, 3, 2).unwrap();
    assert_eq!(hit.id, 0x1_05);
    assert!((hit.depth - 0.5).abs() < 1e-6);
}

#[test]
fn test_integer_tier_reads_id_and_vertex() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 6, 4);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Modern);
    picking.regenerate(&mut device, 6, 4).unwrap();
    picking.clear(&mut device).unwrap();
    draw_picking_quad(&mut device, 300, 0.0);

    let hit = picking.read_pixel(&mut device, 0, 0).unwrap();
    assert_eq!(hit.id, 300);
    assert_eq!(hit.vertex, Some(3));
}

#[test]
fn test_box_is_normalized_and_inclusive() {
    assert_eq!(normalize_box(5, 1, 2, 4), (2, 1, 5, 4));
    assert_eq!(normalize_box(2, 4, 5, 1), (2, 1, 5, 4));

    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 8, 8);
    let mut picking = PickingBuffer::for_tier(CapabilityTier::Modern);
    picking.regenerate(&mut device, 8, 8).unwrap();
    picking.clear(&mut device).unwrap();

    let forward = picking.read_box(&mut device, 1, 2, 3, 3).unwrap();
    let reversed = picking.read_box(&mut device, 3, 3, 1, 2).unwrap();
    assert_eq!(forward.len(), 3 * 2);
    assert_eq!(forward, reversed);
    assert!(forward.iter().all(|d| *d == 1.0));
    assert_eq!(picking.read_box(&mut device, 4, 4, 4, 4).unwrap().len(), 1);
}
