/// Tier-dependent picking buffer

use crate::device::{
    AttachmentPoint, AttachmentSource, CapabilityTier, ClearFlags, ClearValues, FramebufferAttachment, FramebufferId,
    GraphicsDevice, Rect, RenderbufferId, TextureDesc, TextureFormat, TextureId,
};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_err};
use super::cpu_buffer::CpuPickingBuffer;

/// Bits of a mesh id the RGBA buffer can carry
pub const RGBA_ID_MASK: u32 = 0x00FF_FFFF;

/// RGBA color a picking shader writes for `id` on the Programmable tier
///
/// Green holds bits 0-7, red bits 8-15 and blue bits 16-23; alpha is opaque.
pub fn rgba_from_id(id: u32) -> [u8; 4] {
    let id = id & RGBA_ID_MASK;
    [(id >> 8) as u8, id as u8, (id >> 16) as u8, 255]
}

/// Mesh id carried by a BGRA pixel read back from the picking buffer
pub fn id_from_bgra(bgra: &[u8]) -> u32 {
    match bgra {
        [b, g, r, ..] => u32::from(*g) | u32::from(*r) << 8 | u32::from(*b) << 16,
        _ => 0,
    }
}

/// What lies under a window pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResult {
    /// Picking id of the mesh, 0 for background
    pub id: u32,
    /// Vertex nearest to the pixel (Modern tier only)
    pub vertex: Option<u32>,
    /// Depth buffer value in `[0, 1]`
    pub depth: f32,
}

/// Inclusive rectangle with both axes ordered, `(x0, y0, x1, y1)`
pub fn normalize_box(x0: i32, y0: i32, x1: i32, y1: i32) -> (i32, i32, i32, i32) {
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// GPU objects of the Programmable tier
#[derive(Debug)]
pub struct RgbaTargets {
    color: TextureId,
    depth: TextureId,
    framebuffer: FramebufferId,
}

/// GPU objects of the Modern tier
#[derive(Debug)]
pub struct IntegerTargets {
    entity: TextureId,
    vertex: TextureId,
    depth: RenderbufferId,
    framebuffer: FramebufferId,
}

/// Id buffer parallel to a window, one variant per capability tier
///
/// A buffer starts unallocated and must be regenerated at the window size
/// before use; reads fail while it is unallocated.
#[derive(Debug)]
pub enum PickingBuffer {
    Cpu(CpuPickingBuffer),
    Rgba { width: u32, height: u32, targets: Option<RgbaTargets> },
    Integer { width: u32, height: u32, targets: Option<IntegerTargets> },
}

impl PickingBuffer {
    /// Unallocated buffer for the given tier
    pub fn for_tier(tier: CapabilityTier) -> Self {
        match tier {
            CapabilityTier::Legacy => PickingBuffer::Cpu(CpuPickingBuffer::default()),
            CapabilityTier::Programmable => PickingBuffer::Rgba { width: 0, height: 0, targets: None },
            CapabilityTier::Modern => PickingBuffer::Integer { width: 0, height: 0, targets: None },
        }
    }

    // ===== GETTERS =====

    pub fn tier(&self) -> CapabilityTier {
        match self {
            PickingBuffer::Cpu(_) => CapabilityTier::Legacy,
            PickingBuffer::Rgba { .. } => CapabilityTier::Programmable,
            PickingBuffer::Integer { .. } => CapabilityTier::Modern,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            PickingBuffer::Cpu(cpu) => (cpu.width(), cpu.height()),
            PickingBuffer::Rgba { width, height, .. } | PickingBuffer::Integer { width, height, .. } => {
                (*width, *height)
            }
        }
    }

    pub fn is_allocated(&self) -> bool {
        match self {
            PickingBuffer::Cpu(cpu) => !cpu.as_bytes().is_empty(),
            PickingBuffer::Rgba { targets, .. } => targets.is_some(),
            PickingBuffer::Integer { targets, .. } => targets.is_some(),
        }
    }

    /// Framebuffer picking shaders draw into (`None` on the Legacy tier)
    pub fn framebuffer(&self) -> Option<&FramebufferId> {
        match self {
            PickingBuffer::Cpu(_) => None,
            PickingBuffer::Rgba { targets, .. } => targets.as_ref().map(|t| &t.framebuffer),
            PickingBuffer::Integer { targets, .. } => targets.as_ref().map(|t| &t.framebuffer),
        }
    }

    /// Number of color attachments picking shaders write
    pub fn draw_buffers(&self) -> u32 {
        match self {
            PickingBuffer::Integer { .. } => 2,
            _ => 1,
        }
    }

    /// CPU buffer handed to legacy renderers
    pub fn cpu_mut(&mut self) -> Option<&mut CpuPickingBuffer> {
        match self {
            PickingBuffer::Cpu(cpu) => Some(cpu),
            _ => None,
        }
    }

    // ===== LIFECYCLE =====

    /// Size the buffer to the window; no GPU object is recreated when the
    /// size is unchanged. Returns whether the buffer was regenerated.
    pub fn regenerate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<bool> {
        if self.is_allocated() && self.size() == (width, height) {
            return Ok(false);
        }
        if width == 0 || height == 0 {
            return Err(engine_err!("glw::Picking", "Cannot size the picking buffer to {}x{}", width, height));
        }
        self.release(device);

        match self {
            PickingBuffer::Cpu(cpu) => {
                cpu.resize(width, height);
            }
            PickingBuffer::Rgba { width: w, height: h, targets } => {
                *targets = Some(create_rgba_targets(device, width, height)?);
                (*w, *h) = (width, height);
            }
            PickingBuffer::Integer { width: w, height: h, targets } => {
                *targets = Some(create_integer_targets(device, width, height)?);
                (*w, *h) = (width, height);
            }
        }
        engine_debug!("glw::Picking", "Picking buffer ({:?}) regenerated at {}x{}", self.tier(), width, height);
        Ok(true)
    }

    /// Reset every id to 0 and the depth to the far plane
    ///
    /// GPU variants leave their framebuffer bound.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let (width, height) = self.size();
        let draw_buffers = self.draw_buffers();
        match self {
            PickingBuffer::Cpu(cpu) => cpu.clear(),
            PickingBuffer::Rgba { targets: Some(t), .. } => {
                bind_full(device, &t.framebuffer, width, height, draw_buffers);
                device.clear(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL, ClearValues::default());
            }
            PickingBuffer::Integer { targets: Some(t), .. } => {
                bind_full(device, &t.framebuffer, width, height, draw_buffers);
                device.clear_integer_attachment(0, 0);
                device.clear_integer_attachment(1, 0);
                device.clear(ClearFlags::DEPTH, ClearValues::default());
            }
            _ => return Err(engine_err!("glw::Picking", error = not_sized())),
        }
        Ok(())
    }

    /// Mesh id, vertex id and depth under window pixel `(x, y)`
    ///
    /// Coordinates outside the buffer are an error; callers clamp.
    pub fn read_pixel(&self, device: &mut dyn GraphicsDevice, x: i32, y: i32) -> Result<PickResult> {
        let (_, height) = self.size();
        let gl_y = height as i32 - y - 1;
        let pixel = Rect::new(x, gl_y, 1, 1);
        match self {
            PickingBuffer::Cpu(cpu) if !cpu.as_bytes().is_empty() => {
                let id = cpu.read_id(x, y)?;
                let depth = first(device.read_depth(None, pixel)?)?;
                Ok(PickResult { id, vertex: None, depth })
            }
            PickingBuffer::Rgba { targets: Some(t), .. } => {
                let bgra = device.read_color_bgra8(Some(&t.framebuffer), pixel)?;
                let id = id_from_bgra(&bgra);
                let depth = first(device.read_depth(Some(&t.framebuffer), pixel)?)?;
                Ok(PickResult { id, vertex: None, depth })
            }
            PickingBuffer::Integer { targets: Some(t), .. } => {
                let id = first(device.read_integer(Some(&t.framebuffer), 0, pixel)?)?;
                let vertex = first(device.read_integer(Some(&t.framebuffer), 1, pixel)?)?;
                let depth = first(device.read_depth(Some(&t.framebuffer), pixel)?)?;
                Ok(PickResult { id, vertex: Some(vertex), depth })
            }
            _ => Err(engine_err!("glw::Picking", error = not_sized())),
        }
    }

    /// Depths of the inclusive window rectangle `(x0, y0)`-`(x1, y1)`
    ///
    /// Corners may be given in any order. Values are row-major starting
    /// from the bottom row.
    pub fn read_box(&self, device: &mut dyn GraphicsDevice, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<Vec<f32>> {
        if !self.is_allocated() {
            return Err(engine_err!("glw::Picking", error = not_sized()));
        }
        let (x0, y0, x1, y1) = normalize_box(x0, y0, x1, y1);
        let (_, height) = self.size();
        let rect = Rect::new(x0, height as i32 - y1 - 1, x1 - x0 + 1, y1 - y0 + 1);
        match self {
            PickingBuffer::Cpu(_) => device.read_depth(None, rect),
            _ => device.read_depth(self.framebuffer(), rect),
        }
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        match self {
            PickingBuffer::Cpu(cpu) => *cpu = CpuPickingBuffer::default(),
            PickingBuffer::Rgba { width, height, targets } => {
                if let Some(t) = targets.take() {
                    device.delete_framebuffer(t.framebuffer);
                    device.delete_texture(t.color);
                    device.delete_texture(t.depth);
                }
                (*width, *height) = (0, 0);
            }
            PickingBuffer::Integer { width, height, targets } => {
                if let Some(t) = targets.take() {
                    device.delete_framebuffer(t.framebuffer);
                    device.delete_texture(t.entity);
                    device.delete_texture(t.vertex);
                    device.delete_renderbuffer(t.depth);
                }
                (*width, *height) = (0, 0);
            }
        }
    }
}

fn not_sized() -> Error {
    Error::InvalidResource("picking buffer not sized to the window".to_string())
}

fn first<T: Copy>(values: Vec<T>) -> Result<T> {
    values
        .first()
        .copied()
        .ok_or_else(|| engine_err!("glw::Picking", error = Error::IndexError { index: 0, length: 0 }))
}

fn bind_full(device: &mut dyn GraphicsDevice, framebuffer: &FramebufferId, width: u32, height: u32, draw_buffers: u32) {
    let full = Rect::full(width, height);
    device.bind_framebuffer(Some(framebuffer));
    device.set_draw_buffers(draw_buffers);
    device.set_viewport(full);
    device.set_scissor(None);
    device.set_depth_mask(true);
}

fn create_rgba_targets(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<RgbaTargets> {
    let color = device.create_texture(&TextureDesc::new(width, height, TextureFormat::Rgba8), None)?;
    let depth = match device.create_texture(&TextureDesc::new(width, height, TextureFormat::Depth24Stencil8), None) {
        Ok(depth) => depth,
        Err(err) => {
            device.delete_texture(color);
            return Err(err);
        }
    };
    let framebuffer = device.create_framebuffer(&[
        FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(&color) },
        FramebufferAttachment { point: AttachmentPoint::DepthStencil, source: AttachmentSource::Texture(&depth) },
    ]);
    match framebuffer {
        Ok(framebuffer) => Ok(RgbaTargets { color, depth, framebuffer }),
        Err(err) => {
            device.delete_texture(color);
            device.delete_texture(depth);
            Err(err)
        }
    }
}

fn create_integer_targets(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<IntegerTargets> {
    let entity = device.create_texture(&TextureDesc::new(width, height, TextureFormat::R32Uint), None)?;
    let vertex = match device.create_texture(&TextureDesc::new(width, height, TextureFormat::R32Uint), None) {
        Ok(vertex) => vertex,
        Err(err) => {
            device.delete_texture(entity);
            return Err(err);
        }
    };
    let depth = match device.create_renderbuffer(TextureFormat::Depth, width, height) {
        Ok(depth) => depth,
        Err(err) => {
            device.delete_texture(entity);
            device.delete_texture(vertex);
            return Err(err);
        }
    };
    let framebuffer = device.create_framebuffer(&[
        FramebufferAttachment { point: AttachmentPoint::Color(0), source: AttachmentSource::Texture(&entity) },
        FramebufferAttachment { point: AttachmentPoint::Color(1), source: AttachmentSource::Texture(&vertex) },
        FramebufferAttachment { point: AttachmentPoint::Depth, source: AttachmentSource::Renderbuffer(&depth) },
    ]);
    match framebuffer {
        Ok(framebuffer) => Ok(IntegerTargets { entity, vertex, depth, framebuffer }),
        Err(err) => {
            device.delete_texture(entity);
            device.delete_texture(vertex);
            device.delete_renderbuffer(depth);
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "picking_buffer_tests.rs"]
mod tests;
