/// Off-screen color + depth/stencil buffer pair

use crate::device::{
    AttachmentPoint, AttachmentSource, FramebufferAttachment, FramebufferId, GraphicsDevice, Rect, TextureDesc,
    TextureFormat, TextureId,
};
use crate::error::Result;
use crate::{engine_debug, engine_err};

/// RGBA8 color texture and DEPTH24_STENCIL8 depth texture behind one framebuffer
#[derive(Debug, Default)]
pub struct RenderBuffer {
    width: u32,
    height: u32,
    color: Option<TextureId>,
    depth: Option<TextureId>,
    framebuffer: Option<FramebufferId>,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== GETTERS =====

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color(&self) -> Option<&TextureId> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&TextureId> {
        self.depth.as_ref()
    }

    pub fn framebuffer(&self) -> Option<&FramebufferId> {
        self.framebuffer.as_ref()
    }

    pub fn is_generated(&self) -> bool {
        self.framebuffer.is_some()
    }

    // ===== LIFECYCLE =====

    /// (Re)create every object at `width` x `height`, releasing the old ones first
    ///
    /// # Errors
    ///
    /// Fails when a texture cannot be created or the framebuffer is
    /// incomplete; the buffer is left released.
    pub fn generate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        self.release(device);
        if width == 0 || height == 0 {
            return Err(engine_err!("glw::RenderBuffer", "Cannot generate a {}x{} render buffer", width, height));
        }

        let color = device.create_texture(&TextureDesc::new(width, height, TextureFormat::Rgba8), None)?;
        self.color = Some(color);
        let depth = device.create_texture(&TextureDesc::new(width, height, TextureFormat::Depth24Stencil8), None);
        let depth = match depth {
            Ok(depth) => depth,
            Err(err) => {
                self.release(device);
                return Err(err);
            }
        };
        self.depth = Some(depth);

        let framebuffer = match (&self.color, &self.depth) {
            (Some(color), Some(depth)) => device.create_framebuffer(&[
                FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(color) },
                FramebufferAttachment {
                    point: AttachmentPoint::DepthStencil,
                    source: AttachmentSource::Texture(depth),
                },
            ]),
            _ => Err(engine_err!("glw::RenderBuffer", "Render buffer attachments missing")),
        };
        match framebuffer {
            Ok(framebuffer) => {
                engine_debug!("glw::RenderBuffer", "Render buffer {} generated ({}x{})", framebuffer.raw(), width, height);
                self.framebuffer = Some(framebuffer);
                self.width = width;
                self.height = height;
                Ok(())
            }
            Err(err) => {
                self.release(device);
                Err(err)
            }
        }
    }

    /// Whole color attachment as BGRA8, rows bottom-up
    pub fn read_color(&self, device: &mut dyn GraphicsDevice) -> Result<Vec<u8>> {
        let Some(framebuffer) = &self.framebuffer else {
            return Err(engine_err!("glw::RenderBuffer", "Read from a render buffer that was never generated"));
        };
        device.read_color_bgra8(Some(framebuffer), Rect::full(self.width, self.height))
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(framebuffer) = self.framebuffer.take() {
            device.delete_framebuffer(framebuffer);
        }
        if let Some(color) = self.color.take() {
            device.delete_texture(color);
        }
        if let Some(depth) = self.depth.take() {
            device.delete_texture(depth);
        }
        self.width = 0;
        self.height = 0;
    }
}

#[cfg(test)]
#[path = "render_buffer_tests.rs"]
mod tests;
