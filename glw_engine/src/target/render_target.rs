/// Render target - frames drawn into an off-screen render buffer

use crate::device::{ClearFlags, ClearValues, GraphicsDevice, Rect};
use crate::error::Result;
use crate::frame::{FramebufferTarget, Viewport};
use crate::scene::RenderTargetKey;
use crate::texture::Color;
use crate::engine_err;
use super::render_buffer::RenderBuffer;

/// Off-screen destination for a list of frames
///
/// A target either has fixed dimensions or follows the window size
/// (`screen_bound`). The frames it renders are kept by the scene.
#[derive(Debug)]
pub struct RenderTarget {
    label: String,
    requested: Option<(u32, u32)>,
    background: Color,
    buffer: RenderBuffer,
}

impl RenderTarget {
    /// Target of fixed size; a zero dimension makes it follow the window size
    pub fn new(width: u32, height: u32) -> Self {
        let requested = if width == 0 || height == 0 { None } else { Some((width, height)) };
        Self { label: String::new(), requested, background: Color::BLACK, buffer: RenderBuffer::new() }
    }

    /// Target following the window size
    pub fn screen_bound() -> Self {
        Self::new(0, 0)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    // ===== GETTERS =====

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fixed size, `None` when bound to the window size
    pub fn requested_size(&self) -> Option<(u32, u32)> {
        self.requested
    }

    pub fn is_screen_bound(&self) -> bool {
        self.requested.is_none()
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn buffer(&self) -> &RenderBuffer {
        &self.buffer
    }

    /// Size the buffer should have for a given window size
    pub fn desired_size(&self, screen: (u32, u32)) -> (u32, u32) {
        self.requested.unwrap_or(screen)
    }

    /// Full-buffer viewport of this target
    pub fn viewport(&self, key: RenderTargetKey) -> Viewport {
        let (width, height) = self.buffer.size();
        Viewport::new(0, 0, width as i32, height as i32, FramebufferTarget::Target(key))
    }

    // ===== SETTERS =====

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    /// Change the requested size; applied at the next `update`
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.requested = if width == 0 || height == 0 { None } else { Some((width, height)) };
    }

    // ===== LIFECYCLE =====

    /// Regenerate the buffer when its size differs from the desired one
    ///
    /// Returns whether the buffer was regenerated.
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, screen: (u32, u32)) -> Result<bool> {
        let (width, height) = self.desired_size(screen);
        if self.buffer.is_generated() && self.buffer.size() == (width, height) {
            return Ok(false);
        }
        self.buffer.generate(device, width, height)?;
        Ok(true)
    }

    /// Bind the target and clear color, depth and stencil with the background
    pub fn clear(&self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let Some(framebuffer) = self.buffer.framebuffer() else {
            return Err(engine_err!("glw::RenderTarget", "Render target '{}' has no buffer", self.label));
        };
        let full = Rect::full(self.buffer.width(), self.buffer.height());
        device.bind_framebuffer(Some(framebuffer));
        device.set_viewport(full);
        device.set_scissor(Some(full));
        device.set_draw_buffers(1);
        device.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            ClearValues::color(self.background.to_vec4()),
        );
        Ok(())
    }

    /// Color of the last render, BGRA8 rows bottom-up
    pub fn read_color(&self, device: &mut dyn GraphicsDevice) -> Result<Vec<u8>> {
        self.buffer.read_color(device)
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.buffer.release(device);
    }
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
