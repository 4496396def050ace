/// GraphicsDevice trait - the seam between the engine core and a graphics API

use crate::error::Result;
use super::types::*;

/// GL-style immediate graphics device
///
/// One device is owned by each window context and is only ever driven from
/// the thread running that context's render cycle. Every object a device
/// creates is returned as a move-only handle; the window context releases
/// all of them through the `delete_*` calls before it drops the device.
///
/// Coordinates follow the GL convention: framebuffer origin at the
/// bottom-left corner, depth in `[0, 1]`.
pub trait GraphicsDevice: Send {
    // ===== CAPABILITIES =====

    /// Negotiated feature level
    fn capability(&self) -> CapabilityTier;

    /// API version as `major * 10 + minor` (e.g. 33 for 3.3)
    fn version(&self) -> u32;

    /// Pending API error code, 0 when none; reading clears it
    fn check_error(&mut self) -> u32;

    /// Object counters
    fn stats(&self) -> DeviceStats;

    // ===== BUFFERS =====

    /// Create a buffer object initialized with `data`
    ///
    /// # Arguments
    ///
    /// * `target` - Vertex or index binding point
    /// * `usage` - Update frequency hint
    /// * `data` - Initial content (defines the buffer size)
    fn create_buffer(&mut self, target: BufferTarget, usage: BufferUsage, data: &[u8]) -> Result<BufferId>;

    /// Overwrite part of a buffer in place (`offset + data.len()` must fit)
    fn update_buffer(&mut self, buffer: &BufferId, offset: usize, data: &[u8]) -> Result<()>;

    fn delete_buffer(&mut self, buffer: BufferId);

    // ===== VERTEX INPUT =====

    /// Create a vertex array capturing attribute and index bindings
    fn create_vertex_array(&mut self, attributes: &[VertexAttribute<'_>], index: Option<&BufferId>) -> Result<VertexArrayId>;

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Bind a vertex array for subsequent draws (`None` unbinds)
    fn bind_vertex_array(&mut self, vertex_array: Option<&VertexArrayId>);

    /// Bind attributes directly for the next draws (no vertex array)
    fn bind_attributes(&mut self, attributes: &[VertexAttribute<'_>], index: Option<&BufferId>) -> Result<()>;

    // ===== TEXTURES =====

    /// Create a texture, optionally with initial pixels in the format's layout
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureId>;

    /// Replace the whole content of a texture
    fn update_texture(&mut self, texture: &TextureId, data: &[u8]) -> Result<()>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Bind a texture to a sampler unit (`None` unbinds)
    fn bind_texture(&mut self, unit: u32, texture: Option<&TextureId>);

    // ===== RENDERBUFFERS & FRAMEBUFFERS =====

    fn create_renderbuffer(&mut self, format: TextureFormat, width: u32, height: u32) -> Result<RenderbufferId>;

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    /// Create a framebuffer from attachments
    ///
    /// # Errors
    ///
    /// Fails when the resulting framebuffer is incomplete (no attachment,
    /// mismatched sizes or an unknown image).
    fn create_framebuffer(&mut self, attachments: &[FramebufferAttachment<'_>]) -> Result<FramebufferId>;

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Bind a draw framebuffer (`None` is the window's default framebuffer)
    fn bind_framebuffer(&mut self, framebuffer: Option<&FramebufferId>);

    /// Number of color attachments written by fragment output (1 by default)
    fn set_draw_buffers(&mut self, count: u32);

    /// Copy a region between framebuffers with nearest filtering
    fn blit_framebuffer(
        &mut self,
        source: Option<&FramebufferId>,
        source_rect: Rect,
        destination: Option<&FramebufferId>,
        destination_rect: Rect,
        mask: ClearFlags,
    ) -> Result<()>;

    /// Size of the window's default framebuffer
    fn surface_size(&self) -> (u32, u32);

    /// Resize the window's default framebuffer
    fn resize_surface(&mut self, width: u32, height: u32);

    // ===== PROGRAMS =====

    /// Compile and link a program, binding attribute names to locations
    ///
    /// # Errors
    ///
    /// `Error::ShaderLoad` carrying the status bits and the file names.
    fn create_program(&mut self, source: &ProgramSource, attributes: &[(&str, u32)]) -> Result<ProgramId>;

    fn delete_program(&mut self, program: ProgramId);

    /// Location of a uniform, `None` when the program does not use it
    fn uniform_location(&self, program: &ProgramId, name: &str) -> Option<i32>;

    /// Make a program current (`None` returns to the fixed-function path)
    fn use_program(&mut self, program: Option<&ProgramId>);

    /// Assign a uniform of the current program
    fn set_uniform(&mut self, location: i32, value: UniformValue);

    // ===== FIXED-FUNCTION STATE =====

    fn set_viewport(&mut self, rect: Rect);

    /// Enable the scissor test on `rect`, or disable it with `None`
    fn set_scissor(&mut self, rect: Option<Rect>);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_depth_mask(&mut self, enabled: bool);

    fn set_depth_range(&mut self, near: f32, far: f32);

    /// Source-alpha blending
    fn set_blend(&mut self, enabled: bool);

    fn set_polygon_mode(&mut self, mode: PolygonMode);

    fn set_cull_face(&mut self, face: Option<CullFace>);

    fn set_point_size(&mut self, size: f32);

    fn set_line_width(&mut self, width: f32);

    fn set_stencil(&mut self, state: Option<StencilState>);

    // ===== CLEAR & DRAW =====

    /// Clear the bound framebuffer (restricted by the scissor when enabled)
    fn clear(&mut self, flags: ClearFlags, values: ClearValues);

    /// Clear one integer color attachment of the bound framebuffer
    fn clear_integer_attachment(&mut self, attachment: u32, value: u32);

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<()>;

    /// Draw `count` u32 indices from the bound index buffer
    fn draw_elements(&mut self, primitive: Primitive, count: u32) -> Result<()>;

    // ===== READ-BACK =====

    /// Read color attachment 0 as BGRA8, rows bottom-up
    fn read_color_bgra8(&mut self, framebuffer: Option<&FramebufferId>, rect: Rect) -> Result<Vec<u8>>;

    /// Read an integer color attachment, rows bottom-up
    fn read_integer(&mut self, framebuffer: Option<&FramebufferId>, attachment: u32, rect: Rect) -> Result<Vec<u32>>;

    /// Read the depth attachment, rows bottom-up
    fn read_depth(&mut self, framebuffer: Option<&FramebufferId>, rect: Rect) -> Result<Vec<f32>>;

    // ===== PRESENTATION =====

    /// Swap the default framebuffer to the window
    fn present(&mut self) -> Result<()>;
}
