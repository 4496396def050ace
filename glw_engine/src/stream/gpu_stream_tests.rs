//! Unit tests for gpu_stream.rs and index_stream.rs

use super::*;
use crate::device::{CapabilityTier, GraphicsDevice, HeadlessDevice, Primitive};
use crate::stream::IndexStream;

fn device() -> HeadlessDevice {
    HeadlessDevice::new(CapabilityTier::Modern, 4, 4)
}

// ============================================================================
// CPU SIDE
// ============================================================================

#[test]
fn test_alloc_preserves_prefix() {
    let mut stream = ScalarStream::from_vec(vec![1.0, 2.0, 3.0]);
    stream.alloc(5);
    assert_eq!(stream.as_slice(), &[1.0, 2.0, 3.0, 0.0, 0.0]);
    stream.alloc(2);
    assert_eq!(stream.as_slice(), &[1.0, 2.0]);
    assert!(stream.is_dirty());
}

#[test]
fn test_out_of_range_access() {
    let mut stream = ScalarStream::from_vec(vec![4.0, 5.0]);
    assert_eq!(stream.get(1), Ok(&5.0));
    assert_eq!(stream.get(9), Err(Error::IndexError { index: 9, length: 2 }));
    assert!(stream.set(2, 1.0).is_err());
    assert_eq!(stream.element_or_first(9), Some(&4.0));
    assert_eq!(ScalarStream::new().element_or_first(0), None);
}

#[test]
fn test_texture_slab_maps_into_cell() {
    let mut stream = VertexStream::from_vec(vec![
        Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::new(0.0, 0.0)),
        Vertex::new(Vec3::X, Vec3::Z, Vec2::new(1.0, 1.0)),
    ]);
    stream.texture_slab(1, 2, 2, 4);
    assert_eq!(stream.as_slice()[0].tex_coord, Vec2::new(0.5, 0.5));
    assert_eq!(stream.as_slice()[1].tex_coord, Vec2::new(0.75, 1.0));
}

#[test]
fn test_vertex_layout_matches_struct() {
    assert_eq!(std::mem::size_of::<Vertex>(), 32);
    assert_eq!(Vertex::LAYOUT.len(), 3);
    assert_eq!(Vertex::LAYOUT[2].offset, 24);
    assert!(u32::LAYOUT.is_empty());
}

// ============================================================================
// GPU SYNCHRONIZATION
// ============================================================================

#[test]
fn test_empty_stream_is_never_uploaded() {
    let mut device = device();
    let mut stream = VectorStream::new();
    assert_eq!(stream.update_buffer(&mut device).unwrap(), BufferSync::Skipped);
    assert!(stream.buffer().is_none());
    assert_eq!(device.stats().buffers_created, 0);
}

#[test]
fn test_same_length_updates_in_place() {
    let mut device = device();
    let mut stream = ScalarStream::new();
    for n in [1usize, 3, 64] {
        stream.alloc(n);
        stream.sync(&mut device).unwrap();
        let created = device.stats().buffers_created;

        stream.alloc(n);
        assert_eq!(stream.sync(&mut device).unwrap(), BufferSync::Updated);
        assert_eq!(device.stats().buffers_created, created);
        assert!(stream.buffer().is_some());
        assert!(!stream.is_dirty());
    }
}

#[test]
fn test_length_change_recreates_buffer() {
    let mut device = device();
    let mut stream = ScalarStream::new();
    for (n, m) in [(1usize, 2usize), (8, 3), (5, 6)] {
        stream.alloc(n);
        stream.sync(&mut device).unwrap();
        let created = device.stats().buffers_created;

        stream.alloc(m);
        assert_eq!(stream.sync(&mut device).unwrap(), BufferSync::Created);
        assert_eq!(device.stats().buffers_created, created + 1);
        assert_eq!(stream.uploaded_len(), m);
        assert_eq!(device.stats().live_buffers, 1);
    }
}

#[test]
fn test_clean_stream_sync_is_noop() {
    let mut device = device();
    let mut stream = VertexStream::from_positions(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
    assert_eq!(stream.sync(&mut device).unwrap(), BufferSync::Created);
    assert_eq!(stream.sync(&mut device).unwrap(), BufferSync::Skipped);
    assert_eq!(device.stats().buffer_updates, 0);
}

#[test]
fn test_release_frees_buffer() {
    let mut device = device();
    let mut stream = VertexStream::from_positions(&[Vec3::ZERO]);
    stream.sync(&mut device).unwrap();
    assert_eq!(stream.attributes().len(), 3);
    stream.release(&mut device);
    assert!(stream.buffer().is_none());
    assert!(stream.attributes().is_empty());
    assert_eq!(device.stats().live_buffers, 0);
    assert!(stream.needs_sync());
}

// ============================================================================
// INDEX STREAM
// ============================================================================

#[test]
fn test_index_stream_primitive_counts() {
    let indices = IndexStream::from_indices(Primitive::Triangles, vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(indices.primitive_count(), 2);
    let strip = IndexStream::from_indices(Primitive::LineStrip, vec![0, 1, 2, 3]);
    assert_eq!(strip.primitive_count(), 3);
    let lone = IndexStream::new(Primitive::Lines);
    assert_eq!(lone.primitive_count(), 0);
}

#[test]
fn test_index_stream_uploads_to_index_target() {
    let mut device = device();
    let mut indices = IndexStream::from_indices(Primitive::Points, vec![0, 1]);
    indices.sync(&mut device).unwrap();
    assert!(device.commands().iter().any(|c| c.contains("Index")));
}
