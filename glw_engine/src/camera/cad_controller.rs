/// Interactive CAD camera behaviour driven by window input

use std::time::{Duration, Instant};
use glam::Vec3;
use crate::window::{CameraEventHandler, EventContext, Key, KeyAction, MouseButtons};

/// Minimum square-zoom box side, in pixels (exclusive)
pub const SQUARE_ZOOM_MIN: f64 = 7.0;

/// Zoom change per scroll notch
pub const SCROLL_ZOOM_STEP: f32 = 0.05;

const DOUBLE_CLICK: Duration = Duration::from_millis(250);

/// Pixels of vertical motion for one view unit of dolly
const DOLLY_PIXELS: f32 = 500.0;

/// CAD navigation: orbit, pan, dolly, zoom, autofit, hide and square zoom
///
/// | input | effect |
/// |---|---|
/// | right drag | orbit |
/// | middle drag | pan |
/// | ctrl + drag | dolly |
/// | scroll | zoom 5% per notch |
/// | Escape | autofit |
/// | Delete | hide the picked mesh |
/// | Shift press, drag, Shift release | zoom on the dragged box |
/// | left double-click | centre on the clicked point |
#[derive(Debug, Default)]
pub struct CadController {
    previous: (f64, f64),
    shift_press: Option<(f64, f64)>,
    ctrl: bool,
    last_left_click: Option<Instant>,
}

impl CadController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Control is held
    pub fn ctrl(&self) -> bool {
        self.ctrl
    }

    /// View-space offset of a window point from the centre of the input frame
    fn view_offset(ctx: &EventContext<'_>, x: f64, y: f64) -> (f32, f32) {
        let frame = ctx.frame;
        let height = frame.height.max(1) as f64;
        let gl_y = ctx.screen.1 as f64 - y;
        let vx = 2.0 * (x - (frame.x as f64 + frame.width as f64 / 2.0)) / height;
        let vy = 2.0 * (gl_y - (frame.y as f64 + height / 2.0)) / height;
        (vx as f32, vy as f32)
    }

    fn center_on_click(ctx: &mut EventContext<'_>) {
        let (x, y) = ctx.pointer.position;
        let depth = ctx
            .picking
            .pick(x as i32, y as i32)
            .map(|p| p.depth)
            .filter(|d| *d > 0.0 && *d < 1.0);
        let dz = depth.map(|d| 2.0 * (d - 0.5)).unwrap_or(0.0);
        let (vx, vy) = Self::view_offset(ctx, x, y);
        if let Some(camera) = ctx.camera() {
            camera.center_on(Vec3::new(vx, vy, dz));
        }
    }

    fn square_zoom(ctx: &mut EventContext<'_>, press: (f64, f64)) {
        let (x0, y0) = press;
        let (x1, y1) = ctx.pointer.position;
        let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());
        if width <= SQUARE_ZOOM_MIN || height <= SQUARE_ZOOM_MIN {
            return;
        }

        let depths: Vec<f32> = ctx
            .picking
            .pick_box(x0 as i32, y0 as i32, x1 as i32, y1 as i32)
            .into_iter()
            .filter(|d| *d > 0.0 && *d < 1.0)
            .collect();
        let depth = if depths.is_empty() {
            0.5
        } else {
            let mean = depths.iter().sum::<f32>() / depths.len() as f32;
            depths
                .iter()
                .copied()
                .min_by(|a, b| (a - mean).abs().total_cmp(&(b - mean).abs()))
                .unwrap_or(0.5)
        };

        let (vx, vy) = Self::view_offset(ctx, (x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let frame = ctx.frame;
        let magnification = (frame.width as f64 / width).min(frame.height as f64 / height) as f32;
        if let Some(camera) = ctx.camera() {
            camera.zoom_box(Vec3::new(vx, vy, 2.0 * (depth - 0.5)), magnification);
        }
    }
}

impl CameraEventHandler for CadController {
    fn on_click(&mut self, ctx: &mut EventContext<'_>, buttons: MouseButtons) {
        self.previous = ctx.pointer.position;
        if !buttons.contains(MouseButtons::LEFT) {
            return;
        }
        let now = Instant::now();
        match self.last_left_click {
            Some(last) if now.duration_since(last) < DOUBLE_CLICK => {
                self.last_left_click = None;
                Self::center_on_click(ctx);
            }
            _ => self.last_left_click = Some(now),
        }
    }

    fn on_move(&mut self, ctx: &mut EventContext<'_>, buttons: MouseButtons) {
        let (x, y) = ctx.pointer.position;
        let dx = (self.previous.0 - x) as f32;
        let dy = (self.previous.1 - y) as f32;
        self.previous = (x, y);
        let height = ctx.frame.height.max(1) as f32;
        let ctrl = self.ctrl;

        let Some(camera) = ctx.camera() else { return };
        if ctrl && !buttons.is_empty() {
            camera.translate_view(Vec3::new(0.0, 0.0, 2.0 * dy / DOLLY_PIXELS));
        } else if buttons.contains(MouseButtons::RIGHT) {
            camera.rotate(dx, dy);
        } else if buttons.contains(MouseButtons::MIDDLE) {
            camera.translate_view(Vec3::new(2.0 * dx / height, -2.0 * dy / height, 0.0));
        }
    }

    fn on_scroll(&mut self, ctx: &mut EventContext<'_>, _dx: f64, dy: f64) {
        if let Some(camera) = ctx.camera() {
            let zoom = camera.zoom();
            camera.set_zoom(zoom + zoom * SCROLL_ZOOM_STEP * dy as f32);
        }
    }

    fn on_key(&mut self, ctx: &mut EventContext<'_>, key: Key, action: KeyAction) {
        match (key, action) {
            (Key::Control, KeyAction::Press) => self.ctrl = true,
            (Key::Control, KeyAction::Release) => self.ctrl = false,
            (Key::Shift, KeyAction::Press) => self.shift_press = Some(ctx.pointer.position),
            (Key::Shift, KeyAction::Release) => {
                if let Some(press) = self.shift_press.take() {
                    Self::square_zoom(ctx, press);
                }
            }
            (Key::Escape, KeyAction::Release) => {
                ctx.autofit();
            }
            (Key::Delete, KeyAction::Release) => {
                if let Some(mesh) = ctx.picked.and_then(|key| ctx.scene.mesh_mut(key).ok()) {
                    mesh.set_show(0);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "cad_controller_tests.rs"]
mod tests;
