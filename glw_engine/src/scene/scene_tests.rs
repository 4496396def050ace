//! Unit tests for scene.rs

use super::*;
use crate::device::{CapabilityTier, HeadlessDevice};
use crate::frame::Frame;
use crate::shapes;
use crate::window::MeshEventHandler;
use glam::Vec4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn scene() -> Scene {
    Scene::new(16, 4)
}

// ============================================================================
// MESHES
// ============================================================================

#[test]
fn test_picking_ids_are_unique_and_recycled() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let mut scene = scene();
    let a = scene.add_mesh(shapes::quad01()).unwrap();
    let b = scene.add_mesh(shapes::quad01()).unwrap();
    assert_eq!(scene.mesh(a).unwrap().picking_id(), 1);
    assert_eq!(scene.mesh(b).unwrap().picking_id(), 2);
    assert_eq!(scene.mesh_by_picking_id(2), Some(b));

    scene.remove_mesh(&mut device, a).unwrap();
    assert!(scene.mesh(a).is_err());
    assert_eq!(scene.mesh_by_picking_id(1), None);
    let c = scene.add_mesh(shapes::quad01()).unwrap();
    assert_eq!(scene.mesh(c).unwrap().picking_id(), 1);
}

#[test]
fn test_mesh_capacity() {
    let mut scene = Scene::new(3, 4);
    scene.add_mesh(shapes::quad01()).unwrap();
    scene.add_mesh(shapes::quad01()).unwrap();
    match scene.add_mesh(shapes::quad01()) {
        Err(Error::CapacityExceeded(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
}

struct CountDisposals(Arc<AtomicUsize>);

impl MeshEventHandler for CountDisposals {
    fn on_dispose(&mut self, _key: MeshKey, _mesh: &Mesh) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_remove_mesh_notifies_and_unlists() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let mut scene = scene();
    let disposed = Arc::new(AtomicUsize::new(0));
    let mut mesh = shapes::cube(1.0);
    mesh.add_handler(CountDisposals(disposed.clone()));
    let key = scene.add_mesh(mesh).unwrap();
    let camera = scene.add_camera(Camera::cad()).unwrap();
    scene.camera_add_mesh(camera, key).unwrap();
    scene.camera_add_mesh(camera, key).unwrap();
    assert_eq!(scene.camera_meshes(camera).len(), 2);

    scene.mesh_mut(key).unwrap().sync_streams(&mut device).unwrap();
    assert!(device.stats().live_buffers > 0);
    scene.remove_mesh(&mut device, key).unwrap();

    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(scene.camera_meshes(camera).is_empty());
    assert_eq!(device.stats().live_objects(), 0);
    assert!(scene.remove_mesh(&mut device, key).is_err());
}

// ============================================================================
// TRANSFORM HIERARCHY
// ============================================================================

#[test]
fn test_world_matrix_composes_root_to_leaf() {
    let mut scene = scene();
    let mut grandparent = shapes::quad01();
    grandparent.set_rotation(Vec3::new(0.0, 0.0, 90.0));
    grandparent.set_scale(Vec3::new(2.0, 1.0, 1.0));
    let grandparent = scene.add_mesh(grandparent).unwrap();

    let mut parent = shapes::quad01();
    parent.set_position(Vec3::new(1.0, 0.0, 0.0));
    parent.set_rotation(Vec3::new(30.0, 0.0, 0.0));
    parent.set_parent(Some(grandparent));
    let parent = scene.add_mesh(parent).unwrap();

    let mut child = shapes::quad01();
    child.set_position(Vec3::new(0.0, 2.0, 0.0));
    child.set_scale(Vec3::new(1.0, 3.0, 1.0));
    child.set_parent(Some(parent));
    let child = scene.add_mesh(child).unwrap();

    let expected = scene.mesh(grandparent).unwrap().local_matrix()
        * scene.mesh(parent).unwrap().local_matrix()
        * scene.mesh(child).unwrap().local_matrix();
    let world = scene.world_matrix(child).unwrap();
    assert!(world.abs_diff_eq(expected, 1e-5));

    let wrong_order = scene.mesh(child).unwrap().local_matrix()
        * scene.mesh(parent).unwrap().local_matrix()
        * scene.mesh(grandparent).unwrap().local_matrix();
    assert!(!world.abs_diff_eq(wrong_order, 1e-3));
}

#[test]
fn test_world_matrix_survives_cycles_and_stale_parents() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let mut scene = scene();
    let a = scene.add_mesh(shapes::quad01()).unwrap();
    let b = scene.add_mesh(shapes::quad01()).unwrap();
    scene.mesh_mut(a).unwrap().set_parent(Some(b));
    scene.mesh_mut(b).unwrap().set_parent(Some(a));
    assert!(scene.world_matrix(a).is_ok());

    scene.remove_mesh(&mut device, b).unwrap();
    assert_eq!(scene.world_matrix(a).unwrap(), scene.mesh(a).unwrap().local_matrix());
}

// ============================================================================
// CAMERAS & FRAMES
// ============================================================================

#[test]
fn test_camera_capacity_and_removal() {
    let mut scene = Scene::new(16, 1);
    let camera = scene.add_camera(Camera::cad()).unwrap();
    assert!(scene.add_camera(Camera::cad()).is_err());

    let frame = scene.add_frame(Frame::new());
    scene.frame_add_camera(frame, camera).unwrap();
    scene.attach_camera(camera).unwrap();
    scene.attach_camera(camera).unwrap();
    assert_eq!(scene.attached_cameras().len(), 1);

    scene.remove_camera(camera).unwrap();
    assert!(scene.frame_cameras(frame).is_empty());
    assert!(scene.attached_cameras().is_empty());
    assert!(scene.frame_add_camera(frame, camera).is_err());
}

#[test]
fn test_sort_frames_is_stable() {
    let mut scene = scene();
    let three = scene.add_frame(Frame::new().with_preference(3));
    let one = scene.add_frame(Frame::new().with_preference(1));
    let two_a = scene.add_frame(Frame::new().with_preference(2));
    let two_b = scene.add_frame(Frame::new().with_preference(2));
    for frame in [three, one, two_a, two_b] {
        scene.add_screen_frame(frame).unwrap();
    }
    scene.sort_frames();
    assert_eq!(scene.screen_frames(), &[one, two_a, two_b, three]);

    scene.remove_frame(two_a).unwrap();
    assert_eq!(scene.screen_frames(), &[one, two_b, three]);
}

#[test]
fn test_target_frames_are_sorted() {
    let mut scene = scene();
    let target = scene.add_render_target(RenderTarget::new(8, 8));
    let late = scene.add_frame(Frame::new().with_preference(5));
    let early = scene.add_frame(Frame::new().with_preference(-1));
    scene.target_add_frame(target, late).unwrap();
    scene.target_add_frame(target, early).unwrap();
    scene.sort_frames();
    assert_eq!(scene.target_frames(target), &[early, late]);
}

// ============================================================================
// AUTOFIT
// ============================================================================

#[test]
fn test_autofit_unit_cube() {
    let mut scene = scene();
    let cube = scene.add_mesh(shapes::cube(1.0)).unwrap();
    let camera = scene.add_camera(Camera::cad()).unwrap();
    scene.camera_add_mesh(camera, cube).unwrap();
    scene.camera_add_mesh(camera, cube).unwrap();
    assert!(scene.autofit(camera).unwrap());

    let camera_ref = scene.camera(camera).unwrap();
    assert_eq!(camera_ref.eye(), Vec3::ZERO);
    assert!((camera_ref.zoom() - crate::camera::AUTOFIT_MARGIN).abs() < 1e-5);
    assert_eq!(camera_ref.angles(), Vec3::new(0.0, 180.0, 90.0));

    // every corner stays inside the clip cube
    let matrix = camera_ref.calculate_matrix(100, 100);
    for vertex in scene.mesh(cube).unwrap().vertices().as_slice() {
        let clip = matrix * Vec4::from((vertex.position, 1.0));
        assert!(clip.x.abs() <= clip.w && clip.y.abs() <= clip.w);
    }
}

#[test]
fn test_autofit_without_geometry_or_cad() {
    let mut scene = scene();
    let camera = scene.add_camera(Camera::cad()).unwrap();
    assert!(!scene.autofit(camera).unwrap());
    let screen = scene.add_camera(Camera::new(ViewRecipe::Screen)).unwrap();
    assert!(!scene.autofit(screen).unwrap());
}

// ============================================================================
// TEXTURES & TEARDOWN
// ============================================================================

#[test]
fn test_remove_texture_unbinds_meshes() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let mut scene = scene();
    let texture = scene.add_texture(Texture::solid(2, 2, crate::texture::Color::RED).unwrap());
    let mesh = scene.add_mesh(shapes::quad01()).unwrap();
    scene.mesh_mut(mesh).unwrap().set_texture(Some(TextureBinding::Image(texture)));
    scene.texture_mut(texture).unwrap().sync(&mut device).unwrap();

    scene.remove_texture(&mut device, texture).unwrap();
    assert_eq!(scene.mesh(mesh).unwrap().texture(), None);
    assert_eq!(device.stats().live_textures, 0);
}

#[test]
fn test_release_all() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 4, 4);
    let mut scene = scene();
    let mesh = scene.add_mesh(shapes::cube(1.0)).unwrap();
    scene.mesh_mut(mesh).unwrap().sync_streams(&mut device).unwrap();
    let target = scene.add_render_target(RenderTarget::new(4, 4));
    scene.render_target_mut(target).unwrap().update(&mut device, (4, 4)).unwrap();
    assert!(scene.has_gpu_objects());

    scene.release_all(&mut device);
    assert!(!scene.has_gpu_objects());
    assert_eq!(device.stats().live_objects(), 0);
}
