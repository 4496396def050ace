/// Graphics device value types and GPU object handles

use std::num::NonZeroU32;
use std::path::PathBuf;
use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};

// ============================================================================
// GPU object handles
// ============================================================================

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// Handles are move-only: they cannot be copied or cloned, and the
        /// matching `delete_*` device call consumes them.
        #[must_use]
        #[derive(Debug, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wrap a backend object name (0 is never a valid name)
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// Backend object name
            pub fn raw(&self) -> u32 {
                self.0.get()
            }
        }
    };
}

gpu_handle!(
    /// Vertex or index buffer object
    BufferId
);
gpu_handle!(
    /// Vertex array object (Modern tier only)
    VertexArrayId
);
gpu_handle!(
    /// Texture object
    TextureId
);
gpu_handle!(
    /// Renderbuffer object
    RenderbufferId
);
gpu_handle!(
    /// Off-screen framebuffer object
    FramebufferId
);
gpu_handle!(
    /// Linked shader program
    ProgramId
);

// ============================================================================
// Capability negotiation
// ============================================================================

/// Graphics feature level negotiated when a window context is initialized
///
/// The tier selects the mesh update/draw path and the picking implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityTier {
    /// Fixed-function era (1.x): legacy draw callbacks, CPU picking buffer
    Legacy,
    /// Programmable pipeline (2.x): per-draw attribute binding, RGBA id texture
    Programmable,
    /// Core profile (3.x+): cached vertex arrays, integer picking attachments
    Modern,
}

impl CapabilityTier {
    /// Tier for a version number encoded as `major * 10 + minor`
    pub fn from_version(version: u32) -> Self {
        if version >= 30 {
            CapabilityTier::Modern
        } else if version >= 20 {
            CapabilityTier::Programmable
        } else {
            CapabilityTier::Legacy
        }
    }
}

// ============================================================================
// Buffers and vertex input
// ============================================================================

/// Binding point of a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Expected update frequency of a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// One float vertex attribute sourced from a buffer
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute<'a> {
    /// Shader attribute location
    pub location: u32,
    pub buffer: &'a BufferId,
    /// Number of f32 components (1..=4)
    pub components: u32,
    /// Distance in bytes between consecutive elements
    pub stride: u32,
    /// Byte offset of the first element
    pub offset: u32,
}

// ============================================================================
// Textures, renderbuffers and framebuffers
// ============================================================================

/// Storage format of a texture or renderbuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA color; uploads are RGBA-ordered
    Rgba8,
    /// 32-bit unsigned integer (picking ids)
    R32Uint,
    /// 24-bit depth with 8-bit stencil
    Depth24Stencil8,
    /// Depth only
    Depth,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8 | TextureFormat::Depth)
    }
}

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: TextureFilter,
    /// Generate a mipmap chain (only honoured for power-of-two sizes)
    pub mipmaps: bool,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self { width, height, format, filter: TextureFilter::Nearest, mipmaps: false }
    }

    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color(u32),
    Depth,
    DepthStencil,
}

/// Image attached to a framebuffer
#[derive(Debug, Clone, Copy)]
pub enum AttachmentSource<'a> {
    Texture(&'a TextureId),
    Renderbuffer(&'a RenderbufferId),
}

/// One framebuffer attachment; later entries override earlier ones at the
/// same point (depth and depth-stencil share the depth slot)
#[derive(Debug, Clone, Copy)]
pub struct FramebufferAttachment<'a> {
    pub point: AttachmentPoint,
    pub source: AttachmentSource<'a>,
}

bitflags! {
    /// Buffers affected by a clear or blit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Values written by `GraphicsDevice::clear`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// Normalized RGBA
    pub color: Vec4,
    pub depth: f32,
    pub stencil: u8,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self { color: Vec4::ZERO, depth: 1.0, stencil: 0 }
    }
}

impl ClearValues {
    pub fn color(color: Vec4) -> Self {
        Self { color, ..Self::default() }
    }
}

// ============================================================================
// Fixed-function state
// ============================================================================

/// Pixel rectangle, origin at the bottom-left corner of the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width` x `height` surface
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Overlap of two rectangles (empty rectangles have zero size)
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

/// Rasterization mode for filled primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

/// Faces discarded by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Back,
    Front,
}

/// Stencil comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFunc {
    Always,
    Equal,
}

/// Stencil update when both stencil and depth tests pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Replace,
}

/// Stencil test configuration (`None` at the device level disables the test)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub func: StencilFunc,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
    pub pass_op: StencilOp,
}

impl StencilState {
    /// Mark every drawn pixel with `reference`
    pub fn tag(reference: u8) -> Self {
        Self {
            func: StencilFunc::Always,
            reference,
            read_mask: 0xFF,
            write_mask: 0xFF,
            pass_op: StencilOp::Replace,
        }
    }

    /// Only draw where the stored value equals `reference`
    pub fn equal(reference: u8) -> Self {
        Self {
            func: StencilFunc::Equal,
            reference,
            read_mask: 0xFF,
            write_mask: 0xFF,
            pass_op: StencilOp::Keep,
        }
    }
}

// ============================================================================
// Programs
// ============================================================================

/// Shader program source files
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramSource {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub geometry: Option<PathBuf>,
}

impl ProgramSource {
    /// Space-separated file list used in log messages
    pub fn describe(&self) -> String {
        let mut files = format!("{} {}", self.vertex.display(), self.fragment.display());
        if let Some(geometry) = &self.geometry {
            files.push(' ');
            files.push_str(&geometry.display().to_string());
        }
        files
    }
}

/// Value assigned to a program uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

// ============================================================================
// Statistics
// ============================================================================

/// Live object counts and lifetime counters of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub live_buffers: u32,
    pub buffers_created: u32,
    pub buffer_updates: u32,
    pub live_vertex_arrays: u32,
    pub vertex_arrays_created: u32,
    pub live_textures: u32,
    pub textures_created: u32,
    pub live_renderbuffers: u32,
    pub live_framebuffers: u32,
    pub framebuffers_created: u32,
    pub live_programs: u32,
    pub programs_created: u32,
    pub draw_calls: u32,
    pub blits: u32,
    pub frames_presented: u32,
}

impl DeviceStats {
    /// Total number of GPU objects still alive
    pub fn live_objects(&self) -> u32 {
        self.live_buffers
            + self.live_vertex_arrays
            + self.live_textures
            + self.live_renderbuffers
            + self.live_framebuffers
            + self.live_programs
    }
}
