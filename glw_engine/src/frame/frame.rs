/// Frame - a rectangular region of a window or render target

use crate::device::{ClearFlags, ClearValues, GraphicsDevice, Rect};
use crate::scene::RenderTargetKey;
use crate::texture::Color;

/// Framebuffer a viewport draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FramebufferTarget {
    /// The window's default framebuffer
    #[default]
    Window,
    /// An off-screen render target
    Target(RenderTargetKey),
}

/// Pixel rectangle plus the framebuffer it belongs to (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub framebuffer: FramebufferTarget,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32, framebuffer: FramebufferTarget) -> Self {
        Self { x, y, width, height, framebuffer }
    }

    /// Whole window of `width` x `height` pixels
    pub fn window(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32, FramebufferTarget::Window)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Size as unsigned pixels (negative sizes clamp to 0)
    pub fn size(&self) -> (u32, u32) {
        (self.width.max(0) as u32, self.height.max(0) as u32)
    }
}

/// How frame coordinates are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameUnits {
    /// Fractions of the parent size
    #[default]
    Ratio,
    Pixels,
}

/// Sub-region rendering its own cameras
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    label: String,
    active: bool,
    units: FrameUnits,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    preference: i32,
    background: Color,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            label: String::new(),
            active: true,
            units: FrameUnits::Ratio,
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
            preference: 0,
            background: Color::TRANSPARENT,
        }
    }
}

impl Frame {
    /// Frame covering its whole parent
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame over `(x0, y0)`-`(x1, y1)` in the given units
    pub fn with_region(mut self, units: FrameUnits, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.set_region(units, x0, y0, x1, y1);
        self
    }

    pub fn with_preference(mut self, preference: i32) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    // ===== GETTERS =====

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn units(&self) -> FrameUnits {
        self.units
    }

    /// `(x0, y0, x1, y1)`
    pub fn region(&self) -> (f32, f32, f32, f32) {
        (self.x0, self.y0, self.x1, self.y1)
    }

    /// Frames render in ascending preference order
    pub fn preference(&self) -> i32 {
        self.preference
    }

    pub fn background(&self) -> Color {
        self.background
    }

    // ===== SETTERS =====

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_region(&mut self, units: FrameUnits, x0: f32, y0: f32, x1: f32, y1: f32) {
        self.units = units;
        self.x0 = x0;
        self.y0 = y0;
        self.x1 = x1;
        self.y1 = y1;
    }

    pub fn set_preference(&mut self, preference: i32) {
        self.preference = preference;
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    // ===== VIEWPORT =====

    /// Pixel viewport inside a parent viewport (inherits its framebuffer)
    pub fn calculate_viewport(&self, parent: &Viewport) -> Viewport {
        let (x, y, width, height) = match self.units {
            FrameUnits::Pixels => (
                self.x0 as i32,
                self.y0 as i32,
                (self.x1 - self.x0) as i32,
                (self.y1 - self.y0) as i32,
            ),
            FrameUnits::Ratio => {
                let (pw, ph) = (parent.width as f32, parent.height as f32);
                (
                    (pw * self.x0) as i32,
                    (ph * self.y0) as i32,
                    (pw * (self.x1 - self.x0)) as i32,
                    (ph * (self.y1 - self.y0)) as i32,
                )
            }
        };
        Viewport::new(x, y, width, height, parent.framebuffer)
    }

    /// Restrict drawing to the frame and clear it
    ///
    /// Color and depth are cleared when the background is not fully
    /// transparent, depth only otherwise. The caller binds the parent's
    /// framebuffer first.
    pub fn clear(&self, device: &mut dyn GraphicsDevice, parent: &Viewport) -> Viewport {
        let viewport = self.calculate_viewport(parent);
        device.set_viewport(viewport.rect());
        device.set_scissor(Some(viewport.rect()));
        let flags = if self.background.a > 0 {
            ClearFlags::COLOR | ClearFlags::DEPTH
        } else {
            ClearFlags::DEPTH
        };
        device.clear(flags, ClearValues::color(self.background.to_vec4()));
        viewport
    }

    /// Whether a window point (origin top-left) lies inside the frame
    ///
    /// Ratio frames are tested against `parent` scaled coordinates, pixel
    /// frames against their pixel bounds with y flipped.
    pub fn contains(&self, parent: &Viewport, x: f64, y: f64) -> bool {
        let (w, h) = (parent.width as f64, parent.height as f64);
        let (x0, y0, x1, y1) = (self.x0 as f64, self.y0 as f64, self.x1 as f64, self.y1 as f64);
        let (left, right, bottom, top) = match self.units {
            FrameUnits::Ratio => (x0 * w, x1 * w, (1.0 - y0) * h, (1.0 - y1) * h),
            FrameUnits::Pixels => (x0, x1, h - y0, h - y1),
        };
        x >= left.min(right) && x <= left.max(right) && y >= top.min(bottom) && y <= top.max(bottom)
    }
}

/// Stable bubble pass ordering frames by ascending preference
///
/// Equal preferences keep their relative order. Returns whether anything moved.
pub fn sort_by_preference<K>(order: &mut [K], preference: impl Fn(&K) -> i32) -> bool {
    let mut moved = false;
    let n = order.len();
    for pass in 0..n {
        let mut swapped = false;
        for i in 0..n.saturating_sub(pass + 1) {
            if preference(&order[i]) > preference(&order[i + 1]) {
                order.swap(i, i + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
        moved = true;
    }
    moved
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
