//! Unit tests for context.rs

use super::*;
use std::sync::{Arc, Mutex};
use crate::camera::{Camera, ViewRecipe};
use crate::device::HeadlessDevice;
use crate::frame::Frame;
use crate::shader::LegacyDraw;
use crate::window::{Key, MouseButtons};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

// ============================================================================
// HELPERS
// ============================================================================

fn window(tier: CapabilityTier) -> WindowContext {
    let engine = EngineConfig::default();
    let config = WindowConfig::default().with_title("test").with_size(WIDTH, HEIGHT);
    WindowContext::new(&engine, config, Box::new(HeadlessDevice::new(tier, WIDTH, HEIGHT)))
}

fn opened(tier: CapabilityTier) -> WindowContext {
    let mut window = window(tier);
    assert!(window.begin());
    window
}

/// Screen camera in a full-window frame drawing a quad over the left half
fn populate(window: &mut WindowContext, shaders: ShaderMask) -> (MeshKey, CameraKey, FrameKey) {
    let scene = window.scene_mut();
    let camera = scene.add_camera(Camera::new(ViewRecipe::Screen).with_screen_ratio(false)).unwrap();
    let frame = scene.add_frame(Frame::new());
    scene.frame_add_camera(frame, camera).unwrap();
    scene.add_screen_frame(frame).unwrap();

    let mut mesh = shapes::sprite(1.0, 2.0).with_shaders(shaders).with_primary(Color::RED);
    mesh.set_position(Vec3::new(-1.0, -1.0, 0.0));
    let mesh = scene.add_mesh(mesh).unwrap();
    scene.camera_add_mesh(camera, mesh).unwrap();
    (mesh, camera, frame)
}

/// BGRA of a window pixel, origin top-left
fn window_pixel(window: &mut WindowContext, x: i32, y: i32) -> Vec<u8> {
    let device = window.device_mut().unwrap();
    device.read_color_bgra8(None, Rect::new(x, HEIGHT as i32 - y - 1, 1, 1)).unwrap()
}

/// Legacy callback filling the left half of the CPU picking buffer
fn legacy_picking(draw: &mut LegacyDraw<'_>) -> Result<()> {
    let id = draw.mesh.picking_id();
    if let Some(buffer) = draw.picking.as_deref_mut() {
        for y in 0..buffer.height() as i32 {
            for x in 0..buffer.width() as i32 / 2 {
                buffer.write_id(x, y, id)?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_pending_window_opens_at_first_begin() {
    let mut window = window(CapabilityTier::Modern);
    assert_eq!(window.state(), WindowState::Pending);
    assert_eq!(window.version(), 0);
    assert!(window.render().is_err());

    assert!(window.begin());
    assert_eq!(window.state(), WindowState::Open);
    assert_eq!(window.version(), 33);
    assert_eq!(window.tier(), CapabilityTier::Modern);
    assert_eq!(window.picking_buffer().tier(), CapabilityTier::Modern);
}

#[test]
fn test_default_shaders_per_tier() {
    assert_eq!(opened(CapabilityTier::Modern).shaders().len(), 8);
    assert_eq!(opened(CapabilityTier::Programmable).shaders().len(), 7);
    assert!(opened(CapabilityTier::Legacy).shaders().is_empty());
}

#[test]
fn test_close_releases_every_gpu_object() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();
    assert!(window.device().unwrap().stats().live_objects() > 0);

    window.request_close();
    assert!(!window.begin());
    assert_eq!(window.state(), WindowState::Closed);
    assert_eq!(window.device().unwrap().stats().live_objects(), 0);
    assert!(!window.begin());
}

#[test]
fn test_teardown_returns_clean_device() {
    let mut window = opened(CapabilityTier::Programmable);
    populate(&mut window, ShaderMask::SOLID);
    window.render().unwrap();
    let device = window.teardown().unwrap();
    assert_eq!(device.stats().live_objects(), 0);
}

// ============================================================================
// RENDER CYCLE
// ============================================================================

#[test]
fn test_render_draws_mesh_over_background() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::SOLID);
    window.render().unwrap();

    assert_eq!(window_pixel(&mut window, 5, 20), vec![0, 0, 255, 255]);
    assert_eq!(window_pixel(&mut window, 60, 20), vec![255, 0, 0, 255]);
    assert_eq!(window.device().unwrap().stats().frames_presented, 1);
}

#[test]
fn test_hidden_mesh_is_not_drawn() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID);
    window.scene_mut().mesh_mut(mesh).unwrap().set_show(0);
    window.render().unwrap();
    assert_eq!(window_pixel(&mut window, 5, 20), vec![255, 0, 0, 255]);
    assert_eq!(window.device().unwrap().stats().draw_calls, 0);
}

#[test]
fn test_unloaded_slot_is_skipped() {
    let engine = EngineConfig::default();
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, WIDTH, HEIGHT);
    device.fail_program_link("lambertian");
    let mut window = WindowContext::new(&engine, WindowConfig::default().with_size(WIDTH, HEIGHT), Box::new(device));
    assert!(window.begin());
    populate(&mut window, ShaderMask::SOLID);

    window.render().unwrap();
    assert_eq!(window.device().unwrap().stats().draw_calls, 0);
}

#[test]
fn test_resize_regenerates_once() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::SOLID);
    window.render().unwrap();
    let created = window.device().unwrap().stats().textures_created;

    window.render().unwrap();
    window.resize(WIDTH, HEIGHT);
    window.render().unwrap();
    assert_eq!(window.device().unwrap().stats().textures_created, created);

    window.resize(32, 32);
    window.render().unwrap();
    assert!(window.device().unwrap().stats().textures_created > created);
    assert_eq!(window.picking_buffer().size(), (32, 32));
    assert_eq!(window.auxiliary_buffer().size(), (32, 32));
    assert_eq!(window.scene().screen(), (32, 32));
}

#[test]
fn test_multipass_draws_pass_inside_tagged_area() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::ISOLINES);
    window.render().unwrap();

    // one draw for the mesh, one for the pass quad
    assert_eq!(window.device().unwrap().stats().draw_calls, 2);
    assert_eq!(window_pixel(&mut window, 60, 20), vec![255, 0, 0, 255]);
    assert!(window.auxiliary_buffer().is_generated());
}

#[test]
fn test_multipass_copies_viewport_before_each_pass() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::ISOLINES);
    window.add_pass(ShaderMask::ISOLINES, "shader", "edge.fsh").unwrap();
    window.render().unwrap();

    assert_eq!(window.shaders().get(ShaderMask::ISOLINES).unwrap().passes().len(), 2);
    let stats = window.device().unwrap().stats();
    assert_eq!(stats.blits, 2);
    assert_eq!(stats.draw_calls, 3);
}

#[test]
fn test_render_target_frames_draw_off_screen() {
    let mut window = opened(CapabilityTier::Modern);
    let (_, camera, frame) = populate(&mut window, ShaderMask::SOLID);
    let target = window.add_render_target(RenderTarget::new(16, 16).with_background(Color::WHITE));
    {
        let scene = window.scene_mut();
        scene.screen_frames.clear();
        let off_screen = scene.add_frame(Frame::new());
        scene.frame_add_camera(off_screen, camera).unwrap();
        scene.target_add_frame(target, off_screen).unwrap();
        scene.remove_frame(frame).unwrap();
    }
    window.render().unwrap();

    let scene = window.scene();
    let target = scene.render_target(target).unwrap();
    assert_eq!(target.buffer().size(), (16, 16));
    assert_eq!(window_pixel(&mut window, 5, 20), vec![255, 0, 0, 255]);
}

// ============================================================================
// PICKING
// ============================================================================

#[test]
fn test_modern_picking_reports_mesh_and_vertex() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();

    let hit = window.picking(2, 2).unwrap();
    assert_eq!(hit.mesh, mesh);
    assert_eq!(hit.vertex, Some(3));
    assert!((hit.depth - 0.5).abs() < 1e-6);
    assert!(window.picking(60, 20).is_none());
}

#[test]
fn test_programmable_picking_reports_mesh() {
    let mut window = opened(CapabilityTier::Programmable);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();

    let hit = window.picking(10, 10).unwrap();
    assert_eq!(hit.mesh, mesh);
    assert_eq!(hit.vertex, None);
    assert!(window.picking(40, 10).is_none());
}

#[test]
fn test_legacy_picking_through_callback() {
    let mut window = opened(CapabilityTier::Legacy);
    window
        .install_shader(
            Shader::legacy(legacy_picking)
                .with_mask(ShaderMask::PICKING)
                .with_target(ShaderTarget::Picking),
        )
        .unwrap();
    let (mesh, _, _) = populate(&mut window, ShaderMask::PICKING);
    window.render().unwrap();

    assert_eq!(window.picking(3, 3).map(|h| h.mesh), Some(mesh));
    assert!(window.picking(50, 3).is_none());
}

#[test]
fn test_picking_clamps_coordinates() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();
    assert_eq!(window.picking(-10, -10).map(|h| h.mesh), Some(mesh));
    assert!(window.picking(1000, 1000).is_none());
}

#[test]
fn test_picking_waits_for_frame_after_resize() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();
    assert!(window.picking_is_current());

    window.resize(32, 32);
    assert!(!window.picking_is_current());
    assert_eq!(window.picking_buffer().size(), (WIDTH, HEIGHT));
    assert!(window.picking(20, 20).is_none());
    assert!(window.picking_box(0, 0, 4, 4).is_err());

    window.render().unwrap();
    assert!(window.picking_is_current());
    assert_eq!(window.picking(2, 2).map(|h| h.mesh), Some(mesh));
    assert!(window.picking(20, 20).is_none());
}

#[test]
fn test_picking_box_depths() {
    let mut window = opened(CapabilityTier::Modern);
    populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();

    let depths = window.picking_box(40, 5, 30, 6).unwrap();
    assert_eq!(depths.len(), 22);
    assert!(depths.iter().all(|d| *d == 0.5 || *d == 1.0));
    assert!(depths.contains(&0.5));
    assert!(depths.contains(&1.0));
}

#[test]
fn test_removed_mesh_is_no_longer_picked() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    window.render().unwrap();
    window.remove_mesh(mesh).unwrap();
    window.render().unwrap();
    assert!(window.picking(2, 2).is_none());
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
fn test_load_shader_uses_user_slot() {
    let mut window = opened(CapabilityTier::Modern);
    let mask = window.load_shader(Shader::new("shader", "custom.vsh", "custom.fsh")).unwrap();
    assert_eq!(mask.slot(), Some(crate::config::DEFAULT_SHADER_SLOTS));
    assert!(window.shaders().get(mask).unwrap().is_loaded());

    let programs = window.device().unwrap().stats().live_programs;
    assert!(window.remove_shader(mask).is_some());
    assert_eq!(window.device().unwrap().stats().live_programs, programs - 1);
}

#[test]
fn test_install_shader_replaces_and_releases() {
    let mut window = opened(CapabilityTier::Modern);
    window.render().unwrap();
    let programs = window.device().unwrap().stats().live_programs;
    window
        .install_shader(Shader::new("shader", "flat.vsh", "flat.fsh").with_mask(ShaderMask::SOLID))
        .unwrap();
    assert_eq!(window.device().unwrap().stats().live_programs, programs);
    assert_eq!(window.shaders().get(ShaderMask::SOLID).unwrap().fragment(), std::path::Path::new("flat.fsh"));
}

#[test]
fn test_add_pass_loads_at_next_cycle() {
    let mut window = opened(CapabilityTier::Modern);
    window.render().unwrap();
    window.add_pass(ShaderMask::SOLID, "shader", "edge.fsh").unwrap();
    assert!(window.shaders().get(ShaderMask::SOLID).unwrap().needs_reload());
    window.render().unwrap();
    let solid = window.shaders().get(ShaderMask::SOLID).unwrap();
    assert!(solid.passes()[0].is_loaded());
    assert!(window.add_pass(ShaderMask::from_slot(20).unwrap(), "shader", "edge.fsh").is_err());
}

// ============================================================================
// EVENTS
// ============================================================================

struct Recorder(Arc<Mutex<Vec<String>>>);

impl MeshEventHandler for Recorder {
    fn on_click(&mut self, event: &mut MeshEvent<'_>) {
        self.0.lock().unwrap().push(format!("click {:?}", event.vertex));
    }

    fn on_release(&mut self, _event: &mut MeshEvent<'_>) {
        self.0.lock().unwrap().push("release".to_string());
    }

    fn on_enter(&mut self, _event: &mut MeshEvent<'_>) {
        self.0.lock().unwrap().push("enter".to_string());
    }

    fn on_leave(&mut self, _event: &mut MeshEvent<'_>) {
        self.0.lock().unwrap().push("leave".to_string());
    }
}

impl CameraEventHandler for Recorder {
    fn on_scroll(&mut self, ctx: &mut EventContext<'_>, _dx: f64, dy: f64) {
        self.0.lock().unwrap().push(format!("scroll {} {:?}", dy, ctx.picked.is_some()));
    }

    fn on_key(&mut self, _ctx: &mut EventContext<'_>, key: Key, _action: KeyAction) {
        self.0.lock().unwrap().push(format!("key {:?}", key));
    }
}

#[test]
fn test_pointer_events_reach_mesh_handlers() {
    let mut window = opened(CapabilityTier::Modern);
    let (mesh, _, _) = populate(&mut window, ShaderMask::SOLID | ShaderMask::PICKING);
    let log = Arc::new(Mutex::new(Vec::new()));
    window.scene_mut().mesh_mut(mesh).unwrap().add_handler(Recorder(log.clone()));
    window.render().unwrap();

    window.dispatch(InputEvent::CursorMoved { x: 2.0, y: 2.0 });
    assert_eq!(window.hovered(), Some(mesh));
    window.dispatch(InputEvent::MouseButton { button: MouseButtons::LEFT, action: KeyAction::Press });
    assert!(window.pointer().buttons.contains(MouseButtons::LEFT));
    window.dispatch(InputEvent::MouseButton { button: MouseButtons::LEFT, action: KeyAction::Release });
    window.dispatch(InputEvent::CursorMoved { x: 60.0, y: 2.0 });
    assert_eq!(window.hovered(), None);

    let log = log.lock().unwrap();
    assert_eq!(*log, vec!["enter", "click Some(3)", "release", "leave"]);
}

#[test]
fn test_camera_handlers_receive_scroll_and_keys() {
    let mut window = opened(CapabilityTier::Modern);
    let (_, camera, _) = populate(&mut window, ShaderMask::SOLID);
    let log = Arc::new(Mutex::new(Vec::new()));
    window.scene_mut().camera_mut(camera).unwrap().add_handler(Recorder(log.clone()));

    window.dispatch(InputEvent::Scroll { dx: 0.0, dy: 1.0 });
    assert!(log.lock().unwrap().is_empty());

    window.attach_camera(camera).unwrap();
    window.render().unwrap();
    window.dispatch(InputEvent::Scroll { dx: 0.0, dy: 1.0 });
    window.dispatch(InputEvent::Key { key: Key::Escape, action: KeyAction::Press });
    assert_eq!(*log.lock().unwrap(), vec!["scroll 1 false", "key Escape"]);
}

#[test]
fn test_boundary_frame_filters_pointer_events() {
    let mut window = opened(CapabilityTier::Modern);
    let (_, camera, _) = populate(&mut window, ShaderMask::SOLID);
    let right = {
        let scene = window.scene_mut();
        let right = scene.add_frame(Frame::new().with_region(crate::frame::FrameUnits::Ratio, 0.5, 0.0, 1.0, 1.0));
        scene.add_screen_frame(right).unwrap();
        scene.camera_mut(camera).unwrap().set_boundary_frame(Some(right));
        right
    };
    let log = Arc::new(Mutex::new(Vec::new()));
    window.scene_mut().camera_mut(camera).unwrap().add_handler(Recorder(log.clone()));
    window.attach_camera(camera).unwrap();

    window.dispatch(InputEvent::CursorMoved { x: 10.0, y: 10.0 });
    window.dispatch(InputEvent::Scroll { dx: 0.0, dy: 2.0 });
    assert!(log.lock().unwrap().is_empty());

    window.dispatch(InputEvent::CursorMoved { x: 50.0, y: 10.0 });
    assert_eq!(window.frame_from_mouse(50.0, 10.0), Some(right));
    window.dispatch(InputEvent::Scroll { dx: 0.0, dy: 2.0 });
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_resize_and_close_events() {
    let mut window = opened(CapabilityTier::Modern);
    window.dispatch(InputEvent::Resized { width: 20, height: 10 });
    assert_eq!(window.size(), (20, 10));
    assert_eq!(window.device().unwrap().surface_size(), (20, 10));
    window.dispatch(InputEvent::CloseRequested);
    assert_eq!(window.state(), WindowState::Closing);
}

#[test]
fn test_frame_from_mouse_prefers_last_frame() {
    let mut window = opened(CapabilityTier::Modern);
    let (first, second) = {
        let scene = window.scene_mut();
        let first = scene.add_frame(Frame::new());
        let second = scene.add_frame(Frame::new().with_region(crate::frame::FrameUnits::Ratio, 0.0, 0.0, 0.5, 0.5));
        scene.add_screen_frame(first).unwrap();
        scene.add_screen_frame(second).unwrap();
        (first, second)
    };
    // (5, 40) is near the bottom-left corner of the window
    assert_eq!(window.frame_from_mouse(5.0, 40.0), Some(second));
    assert_eq!(window.frame_from_mouse(60.0, 5.0), Some(first));
    window.scene_mut().frame_mut(second).unwrap().set_active(false);
    assert_eq!(window.frame_from_mouse(5.0, 40.0), Some(first));
}
