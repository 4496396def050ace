//! Headless software graphics device
//!
//! `HeadlessDevice` implements [`GraphicsDevice`] entirely on the CPU. It
//! keeps every object the engine creates, rasterizes draws into its
//! attachments with an edge-function rasterizer and answers read-backs, so
//! the whole render cycle (including the three picking tiers) can run
//! without a GPU. It is used by the test-suite and by tools that only need
//! picking or off-screen images.
//!
//! Shading model:
//! - programs whose fragment file name contains `picking` write the
//!   `PickingId` uniform (24 bits over green, red and blue of RGBA attachments, raw value in
//!   integer attachment 0) and the nearest vertex index (integer attachment 1)
//! - other programs write `PrimaryColor`, mixed with the texture bound to
//!   unit 0 by `TextureBlend` when `Texture0` has been assigned
//! - without a program, fragments are white

use glam::{Mat4, Vec2, Vec4};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::picking::rgba_from_id;
use crate::{engine_err, engine_trace};
use super::graphics_device::GraphicsDevice;
use super::raster::{self, Fragment, WindowVertex};
use super::types::*;

const INVALID_VALUE: u32 = 0x0501;
const INVALID_OPERATION: u32 = 0x0502;
const INVALID_FRAMEBUFFER_OPERATION: u32 = 0x0506;

const MAX_COLOR_ATTACHMENTS: usize = 8;
const TEXTURE_UNITS: usize = 4;

/// Uniform names exposed by every headless program, in location order
pub const HEADLESS_UNIFORMS: [&str; 16] = crate::shader::UNIFORM_NAMES;

// ============================================================================
// Software objects
// ============================================================================

enum Pixels {
    Rgba(Vec<[u8; 4]>),
    Uint(Vec<u32>),
    Depth { depth: Vec<f32>, stencil: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Texture,
    Renderbuffer,
    Surface,
}

struct Image {
    kind: ImageKind,
    width: u32,
    height: u32,
    pixels: Pixels,
}

impl Image {
    fn new(kind: ImageKind, width: u32, height: u32, format: TextureFormat) -> Self {
        let count = width as usize * height as usize;
        let pixels = match format {
            TextureFormat::Rgba8 => Pixels::Rgba(vec![[0; 4]; count]),
            TextureFormat::R32Uint => Pixels::Uint(vec![0; count]),
            TextureFormat::Depth24Stencil8 | TextureFormat::Depth => Pixels::Depth {
                depth: vec![1.0; count],
                stencil: vec![0; count],
            },
        };
        Self { kind, width, height, pixels }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn is_depth(&self) -> bool {
        matches!(self.pixels, Pixels::Depth { .. })
    }

    fn rect(&self) -> Rect {
        Rect::full(self.width, self.height)
    }
}

struct SoftBuffer {
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct SoftAttribute {
    location: u32,
    buffer: u32,
    components: u32,
    stride: u32,
    offset: u32,
}

#[derive(Debug, Clone, Default)]
struct VertexInput {
    attributes: Vec<SoftAttribute>,
    index: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct SoftFramebuffer {
    colors: [Option<u32>; MAX_COLOR_ATTACHMENTS],
    depth: Option<u32>,
}

struct SoftProgram {
    writes_ids: bool,
    uniforms: FxHashMap<i32, UniformValue>,
}

struct PipelineState {
    viewport: Rect,
    scissor: Option<Rect>,
    depth_test: bool,
    depth_mask: bool,
    depth_range: (f32, f32),
    blend: bool,
    polygon_mode: PolygonMode,
    cull: Option<CullFace>,
    point_size: f32,
    line_width: f32,
    stencil: Option<StencilState>,
    draw_buffers: u32,
    framebuffer: Option<u32>,
    program: Option<u32>,
    vertex_array: Option<u32>,
    loose_input: VertexInput,
    texture_units: [Option<u32>; TEXTURE_UNITS],
}

impl PipelineState {
    fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Rect::full(width, height),
            scissor: None,
            depth_test: false,
            depth_mask: true,
            depth_range: (0.0, 1.0),
            blend: false,
            polygon_mode: PolygonMode::Fill,
            cull: None,
            point_size: 1.0,
            line_width: 1.0,
            stencil: None,
            draw_buffers: 1,
            framebuffer: None,
            program: None,
            vertex_array: None,
            loose_input: VertexInput::default(),
            texture_units: [None; TEXTURE_UNITS],
        }
    }
}

// ============================================================================
// HeadlessDevice
// ============================================================================

/// CPU implementation of [`GraphicsDevice`]
pub struct HeadlessDevice {
    tier: CapabilityTier,
    version: u32,
    next_name: u32,
    buffers: FxHashMap<u32, SoftBuffer>,
    vertex_arrays: FxHashMap<u32, VertexInput>,
    images: FxHashMap<u32, Image>,
    framebuffers: FxHashMap<u32, SoftFramebuffer>,
    programs: FxHashMap<u32, SoftProgram>,
    surface: SoftFramebuffer,
    surface_size: (u32, u32),
    state: PipelineState,
    link_failures: Vec<String>,
    error: u32,
    commands: Vec<String>,
    stats: DeviceStats,
}

impl HeadlessDevice {
    /// Create a device at the given tier with a `width` x `height` surface
    ///
    /// The reported version is 15, 21 or 33 depending on the tier.
    pub fn new(tier: CapabilityTier, width: u32, height: u32) -> Self {
        let version = match tier {
            CapabilityTier::Legacy => 15,
            CapabilityTier::Programmable => 21,
            CapabilityTier::Modern => 33,
        };
        Self::with_version(version, width, height)
    }

    /// Create a device reporting an explicit `major * 10 + minor` version
    pub fn with_version(version: u32, width: u32, height: u32) -> Self {
        let mut device = Self {
            tier: CapabilityTier::from_version(version),
            version,
            next_name: 1,
            buffers: FxHashMap::default(),
            vertex_arrays: FxHashMap::default(),
            images: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            programs: FxHashMap::default(),
            surface: SoftFramebuffer::default(),
            surface_size: (0, 0),
            state: PipelineState::new(width, height),
            link_failures: Vec::new(),
            error: 0,
            commands: Vec::new(),
            stats: DeviceStats::default(),
        };
        device.resize_surface(width, height);
        device.commands.clear();
        device
    }

    /// Make every program whose vertex or fragment path contains `pattern`
    /// fail to link
    pub fn fail_program_link(&mut self, pattern: impl Into<String>) {
        self.link_failures.push(pattern.into());
    }

    /// Stop simulating link failures
    pub fn clear_link_failures(&mut self) {
        self.link_failures.clear();
    }

    /// Recorded command log
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<String> {
        std::mem::take(&mut self.commands)
    }

    /// RGBA of a pixel of the default framebuffer
    pub fn surface_pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let image = self.images.get(&self.surface.colors[0]?)?;
        let offset = image.offset(x, y)?;
        match &image.pixels {
            Pixels::Rgba(pixels) => Some(pixels[offset]),
            _ => None,
        }
    }

    /// Size of a texture
    pub fn texture_size(&self, texture: &TextureId) -> Option<(u32, u32)> {
        self.images.get(&texture.raw()).map(|image| (image.width, image.height))
    }

    /// Last value assigned to a uniform of a program
    pub fn uniform_value(&self, program: &ProgramId, name: &str) -> Option<UniformValue> {
        let location = HEADLESS_UNIFORMS.iter().position(|n| *n == name)? as i32;
        self.programs.get(&program.raw())?.uniforms.get(&location).copied()
    }

    /// Name of the program currently in use
    pub fn current_program(&self) -> Option<u32> {
        self.state.program
    }

    /// Current line width
    pub fn line_width(&self) -> f32 {
        self.state.line_width
    }

    /// Whether the stencil test is currently enabled
    pub fn stencil_enabled(&self) -> bool {
        self.state.stencil.is_some()
    }

    // ===== INTERNAL HELPERS =====

    fn alloc_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn record(&mut self, command: String) {
        self.commands.push(command);
    }

    fn fail(&mut self, code: u32, message: String) -> Error {
        self.error = code;
        engine_err!("glw::HeadlessDevice", error = Error::GraphicsApi { code, operation: message })
    }

    fn framebuffer(&self, name: Option<u32>) -> Option<SoftFramebuffer> {
        match name {
            None => Some(self.surface),
            Some(name) => self.framebuffers.get(&name).copied(),
        }
    }

    fn framebuffer_rect(&self, framebuffer: &SoftFramebuffer) -> Rect {
        framebuffer
            .colors
            .iter()
            .flatten()
            .chain(framebuffer.depth.iter())
            .find_map(|name| self.images.get(name))
            .map(Image::rect)
            .unwrap_or_default()
    }

    fn uniform(&self, program: Option<&SoftProgram>, name: &str) -> Option<UniformValue> {
        let location = HEADLESS_UNIFORMS.iter().position(|n| *n == name)? as i32;
        program?.uniforms.get(&location).copied()
    }

    fn fetch(&self, attribute: &SoftAttribute, index: u32) -> Option<[f32; 4]> {
        let buffer = self.buffers.get(&attribute.buffer)?;
        let start = attribute.offset as usize + index as usize * attribute.stride as usize;
        let mut out = [0.0, 0.0, 0.0, 1.0];
        for (c, value) in out.iter_mut().enumerate().take(attribute.components.min(4) as usize) {
            let at = start + c * 4;
            let bytes = buffer.data.get(at..at + 4)?;
            *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Some(out)
    }

    fn current_input(&self) -> VertexInput {
        match self.state.vertex_array {
            Some(name) => self.vertex_arrays.get(&name).cloned().unwrap_or_default(),
            None => self.state.loose_input.clone(),
        }
    }

    fn sample(&self, unit: usize, uv: Vec2) -> Option<Vec4> {
        let image = self.images.get(&self.state.texture_units[unit]?)?;
        let x = ((uv.x * image.width as f32).floor() as i32).clamp(0, image.width as i32 - 1);
        let y = ((uv.y * image.height as f32).floor() as i32).clamp(0, image.height as i32 - 1);
        let offset = image.offset(x, y)?;
        match &image.pixels {
            Pixels::Rgba(pixels) => {
                let p = pixels[offset];
                Some(Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0)
            }
            _ => None,
        }
    }

    fn to_window(&self, clip: Vec4, uv: Vec2, id: u32) -> Option<WindowVertex> {
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = self.state.viewport;
        let (near, far) = self.state.depth_range;
        Some(WindowVertex {
            x: vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
            y: vp.y as f32 + (ndc.y + 1.0) * 0.5 * vp.height as f32,
            z: near + (ndc.z + 1.0) * 0.5 * (far - near),
            uv,
            id,
        })
    }

    fn assemble(&self, primitive: Primitive, vertices: &[Option<WindowVertex>], bounds: Rect) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut push = |f: Fragment| fragments.push(f);
        let point_size = self.state.point_size;

        let line = |a: Option<WindowVertex>, b: Option<WindowVertex>, out: &mut dyn FnMut(Fragment)| {
            if let (Some(a), Some(b)) = (a, b) {
                raster::rasterize_line(a, b, bounds, &mut |f| out(f));
            }
        };

        let mut triangles: Vec<[Option<WindowVertex>; 3]> = Vec::new();
        match primitive {
            Primitive::Points => {
                for v in vertices.iter().flatten() {
                    raster::rasterize_point(*v, point_size, bounds, &mut push);
                }
            }
            Primitive::Lines => {
                for pair in vertices.chunks_exact(2) {
                    line(pair[0], pair[1], &mut push);
                }
            }
            Primitive::LineStrip | Primitive::LineLoop => {
                for pair in vertices.windows(2) {
                    line(pair[0], pair[1], &mut push);
                }
                if primitive == Primitive::LineLoop && vertices.len() > 2 {
                    line(vertices[vertices.len() - 1], vertices[0], &mut push);
                }
            }
            Primitive::Triangles => {
                triangles.extend(vertices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]));
            }
            Primitive::TriangleStrip => {
                for (i, t) in vertices.windows(3).enumerate() {
                    if i % 2 == 0 {
                        triangles.push([t[0], t[1], t[2]]);
                    } else {
                        triangles.push([t[1], t[0], t[2]]);
                    }
                }
            }
        }

        for triangle in triangles {
            let [Some(a), Some(b), Some(c)] = triangle else { continue };
            let v = [a, b, c];
            if raster::is_culled(raster::signed_area(&v), self.state.cull) {
                continue;
            }
            match self.state.polygon_mode {
                PolygonMode::Fill => raster::rasterize_triangle(v, bounds, &mut push),
                PolygonMode::Line => {
                    for (p, q) in [(a, b), (b, c), (c, a)] {
                        line(Some(p), Some(q), &mut push);
                    }
                }
                PolygonMode::Point => {
                    for p in v {
                        raster::rasterize_point(p, point_size, bounds, &mut push);
                    }
                }
            }
        }
        fragments
    }

    fn shade(&self, program: Option<&SoftProgram>, fragment: &Fragment, picking_id: u32) -> [u8; 4] {
        let Some(p) = program else {
            return [255, 255, 255, 255];
        };
        if p.writes_ids {
            return rgba_from_id(picking_id);
        }

        let mut color = match self.uniform(program, "PrimaryColor") {
            Some(UniformValue::Vec4(c)) => c,
            _ => Vec4::ONE,
        };
        if self.uniform(program, "Texture0").is_some() {
            if let Some(texel) = self.sample(0, fragment.uv) {
                let blend = match self.uniform(program, "TextureBlend") {
                    Some(UniformValue::Float(b)) => b,
                    _ => 1.0,
                };
                color = color.lerp(texel, blend);
            }
        }
        let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
        [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
    }

    fn write_fragments(&mut self, framebuffer: SoftFramebuffer, fragments: &[Fragment], colors: &[[u8; 4]], picking_id: u32) {
        let state = &self.state;
        let draw_buffers = (state.draw_buffers as usize).min(MAX_COLOR_ATTACHMENTS);
        let (depth_test, depth_mask, stencil, blend) = (state.depth_test, state.depth_mask, state.stencil, state.blend);

        for (fragment, color) in fragments.iter().zip(colors) {
            if let Some(depth_name) = framebuffer.depth {
                if let Some(image) = self.images.get_mut(&depth_name) {
                    let Some(offset) = image.offset(fragment.x, fragment.y) else { continue };
                    if let Pixels::Depth { depth, stencil: stencil_values } = &mut image.pixels {
                        let stored = stencil_values[offset];
                        if let Some(s) = stencil {
                            let passes = match s.func {
                                StencilFunc::Always => true,
                                StencilFunc::Equal => stored & s.read_mask == s.reference & s.read_mask,
                            };
                            if !passes {
                                continue;
                            }
                        }
                        if depth_test {
                            if fragment.z >= depth[offset] {
                                continue;
                            }
                            if depth_mask {
                                depth[offset] = fragment.z;
                            }
                        }
                        if let Some(s) = stencil {
                            if s.pass_op == StencilOp::Replace {
                                stencil_values[offset] = (s.reference & s.write_mask) | (stored & !s.write_mask);
                            }
                        }
                    }
                }
            }

            for (index, name) in framebuffer.colors.iter().enumerate().take(draw_buffers) {
                let Some(image) = name.and_then(|n| self.images.get_mut(&n)) else { continue };
                let Some(offset) = image.offset(fragment.x, fragment.y) else { continue };
                match &mut image.pixels {
                    Pixels::Rgba(pixels) => {
                        pixels[offset] = if blend && color[3] < 255 {
                            let a = color[3] as f32 / 255.0;
                            let dst = pixels[offset];
                            let mut out = [0u8; 4];
                            for c in 0..4 {
                                out[c] = (color[c] as f32 * a + dst[c] as f32 * (1.0 - a)).round() as u8;
                            }
                            out
                        } else {
                            *color
                        };
                    }
                    Pixels::Uint(values) => {
                        values[offset] = if index == 0 { picking_id } else { fragment.vertex_id };
                    }
                    Pixels::Depth { .. } => {}
                }
            }
        }
    }

    fn draw(&mut self, primitive: Primitive, indices: Vec<u32>) -> Result<()> {
        self.stats.draw_calls += 1;
        self.record(format!("draw {:?} {}", primitive, indices.len()));

        let input = self.current_input();
        let Some(position) = input.attributes.iter().find(|a| a.location == 0).copied() else {
            return Err(self.fail(INVALID_OPERATION, "draw without position attribute".to_string()));
        };
        let texcoord = input.attributes.iter().find(|a| a.location == 2).copied();

        let Some(framebuffer) = self.framebuffer(self.state.framebuffer) else {
            return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, "draw into deleted framebuffer".to_string()));
        };
        let mut bounds = self.state.viewport.intersect(&self.framebuffer_rect(&framebuffer));
        if let Some(scissor) = self.state.scissor {
            bounds = bounds.intersect(&scissor);
        }

        let program = self.state.program.and_then(|name| self.programs.get(&name));
        let mvp = match self.uniform(program, "ModelViewProjMatrix") {
            Some(UniformValue::Mat4(m)) => m,
            _ => Mat4::IDENTITY,
        };
        let picking_id = match self.uniform(program, "PickingId") {
            Some(UniformValue::Int(id)) => id.max(0) as u32,
            _ => 0,
        };

        let mut vertices = Vec::with_capacity(indices.len());
        for &index in &indices {
            let Some(p) = self.fetch(&position, index) else {
                vertices.push(None);
                continue;
            };
            let uv = texcoord
                .and_then(|t| self.fetch(&t, index))
                .map(|t| Vec2::new(t[0], t[1]))
                .unwrap_or(Vec2::ZERO);
            let clip = mvp * Vec4::new(p[0], p[1], p[2], 1.0);
            vertices.push(self.to_window(clip, uv, index));
        }

        let fragments = self.assemble(primitive, &vertices, bounds);
        let colors: Vec<[u8; 4]> = fragments.iter().map(|f| self.shade(program, f, picking_id)).collect();
        self.write_fragments(framebuffer, &fragments, &colors, picking_id);
        Ok(())
    }

    fn clear_region(&self, framebuffer: &SoftFramebuffer) -> Rect {
        let rect = self.framebuffer_rect(framebuffer);
        match self.state.scissor {
            Some(scissor) => rect.intersect(&scissor),
            None => rect,
        }
    }

    fn read_region<T: Copy>(&mut self, framebuffer: Option<&FramebufferId>, rect: Rect, pick: impl Fn(&Image, usize) -> Option<T>, select: impl Fn(&SoftFramebuffer) -> Option<u32>) -> Result<Vec<T>> {
        let Some(fb) = self.framebuffer(framebuffer.map(|f| f.raw())) else {
            return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, "read from unknown framebuffer".to_string()));
        };
        let Some(image) = select(&fb).and_then(|name| self.images.get(&name)) else {
            return Err(self.fail(INVALID_OPERATION, "read from missing attachment".to_string()));
        };
        if rect.width <= 0 || rect.height <= 0 || image.rect().intersect(&rect) != rect {
            let message = format!("read rectangle {:?} outside {}x{}", rect, image.width, image.height);
            return Err(self.fail(INVALID_VALUE, message));
        }
        let mut out = Vec::with_capacity(rect.area());
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let offset = image.offset(x, y).and_then(|o| pick(image, o));
                match offset {
                    Some(value) => out.push(value),
                    None => return Err(self.fail(INVALID_OPERATION, "attachment format mismatch".to_string())),
                }
            }
        }
        Ok(out)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capability(&self) -> CapabilityTier {
        self.tier
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn check_error(&mut self) -> u32 {
        std::mem::take(&mut self.error)
    }

    fn stats(&self) -> DeviceStats {
        self.stats
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, target: BufferTarget, usage: BufferUsage, data: &[u8]) -> Result<BufferId> {
        let name = self.alloc_name();
        self.buffers.insert(name, SoftBuffer { data: data.to_vec() });
        self.stats.live_buffers += 1;
        self.stats.buffers_created += 1;
        self.record(format!("create_buffer {} {:?} {:?} {}", name, target, usage, data.len()));
        BufferId::from_raw(name).ok_or(Error::OutOfMemory)
    }

    fn update_buffer(&mut self, buffer: &BufferId, offset: usize, data: &[u8]) -> Result<()> {
        let name = buffer.raw();
        let fits = self.buffers.get(&name).map(|b| offset + data.len() <= b.data.len());
        match fits {
            Some(true) => {
                if let Some(b) = self.buffers.get_mut(&name) {
                    b.data[offset..offset + data.len()].copy_from_slice(data);
                }
                self.stats.buffer_updates += 1;
                self.record(format!("update_buffer {} {} {}", name, offset, data.len()));
                Ok(())
            }
            Some(false) => Err(self.fail(INVALID_VALUE, format!("update_buffer {} out of range", name))),
            None => Err(self.fail(INVALID_VALUE, format!("update_buffer {} unknown", name))),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer.raw()).is_some() {
            self.stats.live_buffers -= 1;
            self.record(format!("delete_buffer {}", buffer.raw()));
        }
    }

    // ===== VERTEX INPUT =====

    fn create_vertex_array(&mut self, attributes: &[VertexAttribute<'_>], index: Option<&BufferId>) -> Result<VertexArrayId> {
        let input = VertexInput {
            attributes: attributes
                .iter()
                .map(|a| SoftAttribute {
                    location: a.location,
                    buffer: a.buffer.raw(),
                    components: a.components,
                    stride: a.stride,
                    offset: a.offset,
                })
                .collect(),
            index: index.map(|i| i.raw()),
        };
        let name = self.alloc_name();
        self.vertex_arrays.insert(name, input);
        self.stats.live_vertex_arrays += 1;
        self.stats.vertex_arrays_created += 1;
        self.record(format!("create_vertex_array {}", name));
        VertexArrayId::from_raw(name).ok_or(Error::OutOfMemory)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        let name = vertex_array.raw();
        if self.vertex_arrays.remove(&name).is_some() {
            self.stats.live_vertex_arrays -= 1;
            if self.state.vertex_array == Some(name) {
                self.state.vertex_array = None;
            }
            self.record(format!("delete_vertex_array {}", name));
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<&VertexArrayId>) {
        self.state.vertex_array = vertex_array.map(|v| v.raw());
    }

    fn bind_attributes(&mut self, attributes: &[VertexAttribute<'_>], index: Option<&BufferId>) -> Result<()> {
        if let Some(missing) = attributes.iter().find(|a| !self.buffers.contains_key(&a.buffer.raw())) {
            let message = format!("bind_attributes with unknown buffer {}", missing.buffer.raw());
            return Err(self.fail(INVALID_VALUE, message));
        }
        self.state.vertex_array = None;
        self.state.loose_input = VertexInput {
            attributes: attributes
                .iter()
                .map(|a| SoftAttribute {
                    location: a.location,
                    buffer: a.buffer.raw(),
                    components: a.components,
                    stride: a.stride,
                    offset: a.offset,
                })
                .collect(),
            index: index.map(|i| i.raw()),
        };
        Ok(())
    }

    // ===== TEXTURES =====

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(self.fail(INVALID_VALUE, format!("create_texture {}x{}", desc.width, desc.height)));
        }
        let name = self.alloc_name();
        self.images.insert(name, Image::new(ImageKind::Texture, desc.width, desc.height, desc.format));
        self.stats.live_textures += 1;
        self.stats.textures_created += 1;
        self.record(format!("create_texture {} {:?} {}x{}", name, desc.format, desc.width, desc.height));
        let id = TextureId::from_raw(name).ok_or(Error::OutOfMemory)?;
        if let Some(data) = data {
            if let Err(err) = self.update_texture(&id, data) {
                self.delete_texture(id);
                return Err(err);
            }
        }
        Ok(id)
    }

    fn update_texture(&mut self, texture: &TextureId, data: &[u8]) -> Result<()> {
        let name = texture.raw();
        let Some(image) = self.images.get_mut(&name) else {
            return Err(self.fail(INVALID_VALUE, format!("update_texture {} unknown", name)));
        };
        let expected = image.width as usize * image.height as usize * 4;
        if data.len() != expected {
            let message = format!("update_texture {} expects {} bytes, got {}", name, expected, data.len());
            return Err(self.fail(INVALID_VALUE, message));
        }
        match &mut image.pixels {
            Pixels::Rgba(pixels) => {
                for (pixel, bytes) in pixels.iter_mut().zip(data.chunks_exact(4)) {
                    *pixel = [bytes[0], bytes[1], bytes[2], bytes[3]];
                }
            }
            Pixels::Uint(values) => {
                for (value, bytes) in values.iter_mut().zip(data.chunks_exact(4)) {
                    *value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
            Pixels::Depth { .. } => {
                return Err(self.fail(INVALID_OPERATION, format!("update_texture {} is a depth texture", name)));
            }
        }
        self.record(format!("update_texture {}", name));
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let name = texture.raw();
        if self.images.get(&name).map(|i| i.kind) == Some(ImageKind::Texture) {
            self.images.remove(&name);
            self.stats.live_textures -= 1;
            for unit in self.state.texture_units.iter_mut() {
                if *unit == Some(name) {
                    *unit = None;
                }
            }
            self.record(format!("delete_texture {}", name));
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&TextureId>) {
        if let Some(slot) = self.state.texture_units.get_mut(unit as usize) {
            *slot = texture.map(|t| t.raw());
        } else {
            self.error = INVALID_VALUE;
        }
    }

    // ===== RENDERBUFFERS & FRAMEBUFFERS =====

    fn create_renderbuffer(&mut self, format: TextureFormat, width: u32, height: u32) -> Result<RenderbufferId> {
        if width == 0 || height == 0 {
            return Err(self.fail(INVALID_VALUE, format!("create_renderbuffer {}x{}", width, height)));
        }
        let name = self.alloc_name();
        self.images.insert(name, Image::new(ImageKind::Renderbuffer, width, height, format));
        self.stats.live_renderbuffers += 1;
        self.record(format!("create_renderbuffer {} {:?} {}x{}", name, format, width, height));
        RenderbufferId::from_raw(name).ok_or(Error::OutOfMemory)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        let name = renderbuffer.raw();
        if self.images.get(&name).map(|i| i.kind) == Some(ImageKind::Renderbuffer) {
            self.images.remove(&name);
            self.stats.live_renderbuffers -= 1;
            self.record(format!("delete_renderbuffer {}", name));
        }
    }

    fn create_framebuffer(&mut self, attachments: &[FramebufferAttachment<'_>]) -> Result<FramebufferId> {
        let mut framebuffer = SoftFramebuffer::default();
        let mut size: Option<(u32, u32)> = None;

        for attachment in attachments {
            let name = match attachment.source {
                AttachmentSource::Texture(t) => t.raw(),
                AttachmentSource::Renderbuffer(r) => r.raw(),
            };
            let Some(image) = self.images.get(&name) else {
                return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, format!("attachment {} unknown", name)));
            };
            if *size.get_or_insert((image.width, image.height)) != (image.width, image.height) {
                return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, "attachment sizes differ".to_string()));
            }
            match attachment.point {
                AttachmentPoint::Color(index) if (index as usize) < MAX_COLOR_ATTACHMENTS && !image.is_depth() => {
                    framebuffer.colors[index as usize] = Some(name);
                }
                AttachmentPoint::Depth | AttachmentPoint::DepthStencil if image.is_depth() => {
                    framebuffer.depth = Some(name);
                }
                point => {
                    return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, format!("bad attachment {:?}", point)));
                }
            }
        }
        if size.is_none() {
            return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, "framebuffer without attachment".to_string()));
        }

        let name = self.alloc_name();
        self.framebuffers.insert(name, framebuffer);
        self.stats.live_framebuffers += 1;
        self.stats.framebuffers_created += 1;
        self.record(format!("create_framebuffer {}", name));
        FramebufferId::from_raw(name).ok_or(Error::OutOfMemory)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        let name = framebuffer.raw();
        if self.framebuffers.remove(&name).is_some() {
            self.stats.live_framebuffers -= 1;
            if self.state.framebuffer == Some(name) {
                self.state.framebuffer = None;
            }
            self.record(format!("delete_framebuffer {}", name));
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&FramebufferId>) {
        let name = framebuffer.map(|f| f.raw());
        if name.is_some_and(|n| !self.framebuffers.contains_key(&n)) {
            self.error = INVALID_OPERATION;
            return;
        }
        self.state.framebuffer = name;
        self.state.draw_buffers = 1;
        self.record(format!("bind_framebuffer {}", name.unwrap_or(0)));
    }

    fn set_draw_buffers(&mut self, count: u32) {
        self.state.draw_buffers = count.clamp(1, MAX_COLOR_ATTACHMENTS as u32);
    }

    fn blit_framebuffer(
        &mut self,
        source: Option<&FramebufferId>,
        source_rect: Rect,
        destination: Option<&FramebufferId>,
        destination_rect: Rect,
        mask: ClearFlags,
    ) -> Result<()> {
        let (Some(src), Some(dst)) = (self.framebuffer(source.map(|f| f.raw())), self.framebuffer(destination.map(|f| f.raw()))) else {
            return Err(self.fail(INVALID_FRAMEBUFFER_OPERATION, "blit with unknown framebuffer".to_string()));
        };
        if destination_rect.width <= 0 || destination_rect.height <= 0 || source_rect.width <= 0 || source_rect.height <= 0 {
            return Ok(());
        }

        let source_of = |dx: i32, dy: i32| -> (i32, i32) {
            let sx = source_rect.x + (dx - destination_rect.x) * source_rect.width / destination_rect.width;
            let sy = source_rect.y + (dy - destination_rect.y) * source_rect.height / destination_rect.height;
            (sx, sy)
        };

        let mut copies: Vec<(u32, u32, Vec<(usize, usize)>)> = Vec::new();
        if mask.contains(ClearFlags::COLOR) {
            if let (Some(s), Some(d)) = (src.colors[0], dst.colors[0]) {
                copies.push((s, d, Vec::new()));
            }
        }
        if mask.intersects(ClearFlags::DEPTH | ClearFlags::STENCIL) {
            if let (Some(s), Some(d)) = (src.depth, dst.depth) {
                copies.push((s, d, Vec::new()));
            }
        }

        for (s, d, pairs) in copies.iter_mut() {
            let (Some(si), Some(di)) = (self.images.get(&*s), self.images.get(&*d)) else { continue };
            for dy in destination_rect.y..destination_rect.y + destination_rect.height {
                for dx in destination_rect.x..destination_rect.x + destination_rect.width {
                    let (sx, sy) = source_of(dx, dy);
                    if let (Some(so), Some(doff)) = (si.offset(sx, sy), di.offset(dx, dy)) {
                        pairs.push((so, doff));
                    }
                }
            }
        }

        let mut incompatible = false;
        for (s, d, pairs) in copies {
            let Some(source_image) = self.images.get(&s) else { continue };
            let copied = match &source_image.pixels {
                Pixels::Rgba(p) => Pixels::Rgba(pairs.iter().map(|(so, _)| p[*so]).collect()),
                Pixels::Uint(p) => Pixels::Uint(pairs.iter().map(|(so, _)| p[*so]).collect()),
                Pixels::Depth { depth, stencil } => Pixels::Depth {
                    depth: pairs.iter().map(|(so, _)| depth[*so]).collect(),
                    stencil: pairs.iter().map(|(so, _)| stencil[*so]).collect(),
                },
            };
            let Some(target) = self.images.get_mut(&d) else { continue };
            match (&mut target.pixels, copied) {
                (Pixels::Rgba(t), Pixels::Rgba(c)) => {
                    for ((_, doff), v) in pairs.iter().zip(c) {
                        t[*doff] = v;
                    }
                }
                (Pixels::Uint(t), Pixels::Uint(c)) => {
                    for ((_, doff), v) in pairs.iter().zip(c) {
                        t[*doff] = v;
                    }
                }
                (Pixels::Depth { depth: td, stencil: ts }, Pixels::Depth { depth, stencil }) => {
                    for (((_, doff), z), st) in pairs.iter().zip(depth).zip(stencil) {
                        if mask.contains(ClearFlags::DEPTH) {
                            td[*doff] = z;
                        }
                        if mask.contains(ClearFlags::STENCIL) {
                            ts[*doff] = st;
                        }
                    }
                }
                _ => incompatible = true,
            }
        }
        if incompatible {
            return Err(self.fail(INVALID_OPERATION, "blit between incompatible formats".to_string()));
        }
        self.stats.blits += 1;
        self.record(format!("blit {:?} -> {:?}", source_rect, destination_rect));
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        for name in self.surface.colors.iter().flatten().chain(self.surface.depth.iter()) {
            self.images.remove(name);
        }
        let (width, height) = (width.max(1), height.max(1));
        let color = self.alloc_name();
        let depth = self.alloc_name();
        self.images.insert(color, Image::new(ImageKind::Surface, width, height, TextureFormat::Rgba8));
        self.images.insert(depth, Image::new(ImageKind::Surface, width, height, TextureFormat::Depth24Stencil8));
        self.surface = SoftFramebuffer::default();
        self.surface.colors[0] = Some(color);
        self.surface.depth = Some(depth);
        self.surface_size = (width, height);
        self.record(format!("resize_surface {}x{}", width, height));
    }

    // ===== PROGRAMS =====

    fn create_program(&mut self, source: &ProgramSource, attributes: &[(&str, u32)]) -> Result<ProgramId> {
        let vertex = source.vertex.to_string_lossy().to_string();
        let fragment = source.fragment.to_string_lossy().to_string();
        if self.link_failures.iter().any(|p| vertex.contains(p.as_str()) || fragment.contains(p.as_str())) {
            self.record(format!("link_failed {}", source.describe()));
            return Err(Error::ShaderLoad { status: 8, files: source.describe() });
        }

        let writes_ids = source
            .fragment
            .file_name()
            .map(|f| f.to_string_lossy().contains("picking"))
            .unwrap_or(false);
        let name = self.alloc_name();
        self.programs.insert(name, SoftProgram { writes_ids, uniforms: FxHashMap::default() });
        self.stats.live_programs += 1;
        self.stats.programs_created += 1;
        engine_trace!("glw::HeadlessDevice", "Program {} linked ({} attributes)", name, attributes.len());
        self.record(format!("create_program {} {}", name, source.describe()));
        ProgramId::from_raw(name).ok_or(Error::OutOfMemory)
    }

    fn delete_program(&mut self, program: ProgramId) {
        let name = program.raw();
        if self.programs.remove(&name).is_some() {
            self.stats.live_programs -= 1;
            if self.state.program == Some(name) {
                self.state.program = None;
            }
            self.record(format!("delete_program {}", name));
        }
    }

    fn uniform_location(&self, program: &ProgramId, name: &str) -> Option<i32> {
        if !self.programs.contains_key(&program.raw()) {
            return None;
        }
        HEADLESS_UNIFORMS.iter().position(|n| *n == name).map(|l| l as i32)
    }

    fn use_program(&mut self, program: Option<&ProgramId>) {
        let name = program.map(|p| p.raw());
        if name.is_some_and(|n| !self.programs.contains_key(&n)) {
            self.error = INVALID_OPERATION;
            return;
        }
        self.state.program = name;
        self.record(format!("use_program {}", name.unwrap_or(0)));
    }

    fn set_uniform(&mut self, location: i32, value: UniformValue) {
        match self.state.program.and_then(|name| self.programs.get_mut(&name)) {
            Some(program) => {
                program.uniforms.insert(location, value);
            }
            None => self.error = INVALID_OPERATION,
        }
    }

    // ===== FIXED-FUNCTION STATE =====

    fn set_viewport(&mut self, rect: Rect) {
        self.state.viewport = rect;
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.state.scissor = rect;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.state.depth_mask = enabled;
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.state.depth_range = (near, far);
    }

    fn set_blend(&mut self, enabled: bool) {
        self.state.blend = enabled;
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.state.polygon_mode = mode;
    }

    fn set_cull_face(&mut self, face: Option<CullFace>) {
        self.state.cull = face;
    }

    fn set_point_size(&mut self, size: f32) {
        self.state.point_size = size;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state.line_width = width;
    }

    fn set_stencil(&mut self, state: Option<StencilState>) {
        self.state.stencil = state;
    }

    // ===== CLEAR & DRAW =====

    fn clear(&mut self, flags: ClearFlags, values: ClearValues) {
        let Some(fb) = self.framebuffer(self.state.framebuffer) else {
            self.error = INVALID_FRAMEBUFFER_OPERATION;
            return;
        };
        let region = self.clear_region(&fb);
        let draw_buffers = self.state.draw_buffers as usize;
        let c = (values.color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
        let rgba = [c.x as u8, c.y as u8, c.z as u8, c.w as u8];

        let mut targets: Vec<u32> = Vec::new();
        if flags.contains(ClearFlags::COLOR) {
            targets.extend(fb.colors.iter().take(draw_buffers.max(1)).flatten());
        }
        if flags.intersects(ClearFlags::DEPTH | ClearFlags::STENCIL) {
            targets.extend(fb.depth.iter());
        }

        for name in targets {
            let Some(image) = self.images.get_mut(&name) else { continue };
            for y in region.y..region.y + region.height {
                for x in region.x..region.x + region.width {
                    let Some(offset) = image.offset(x, y) else { continue };
                    match &mut image.pixels {
                        Pixels::Rgba(p) => p[offset] = rgba,
                        Pixels::Uint(p) => p[offset] = values.color.x.max(0.0) as u32,
                        Pixels::Depth { depth, stencil } => {
                            if flags.contains(ClearFlags::DEPTH) {
                                depth[offset] = values.depth;
                            }
                            if flags.contains(ClearFlags::STENCIL) {
                                stencil[offset] = values.stencil;
                            }
                        }
                    }
                }
            }
        }
        self.record(format!("clear {:?}", flags));
    }

    fn clear_integer_attachment(&mut self, attachment: u32, value: u32) {
        let Some(fb) = self.framebuffer(self.state.framebuffer) else {
            self.error = INVALID_FRAMEBUFFER_OPERATION;
            return;
        };
        let region = self.clear_region(&fb);
        let Some(image) = fb
            .colors
            .get(attachment as usize)
            .copied()
            .flatten()
            .and_then(|name| self.images.get_mut(&name))
        else {
            self.error = INVALID_OPERATION;
            return;
        };
        if let Pixels::Uint(values) = &mut image.pixels {
            for y in region.y..region.y + region.height {
                for x in region.x..region.x + region.width {
                    if let Some(offset) = image_offset(image.width, image.height, x, y) {
                        values[offset] = value;
                    }
                }
            }
        } else {
            self.error = INVALID_OPERATION;
            return;
        }
        self.record(format!("clear_integer {} {}", attachment, value));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<()> {
        self.draw(primitive, (first..first + count).collect())
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32) -> Result<()> {
        let input = self.current_input();
        let Some(index) = input.index.and_then(|name| self.buffers.get(&name)) else {
            return Err(self.fail(INVALID_OPERATION, "draw_elements without index buffer".to_string()));
        };
        let available = index.data.len() / 4;
        if count as usize > available {
            let message = format!("draw_elements {} indices, buffer holds {}", count, available);
            return Err(self.fail(INVALID_VALUE, message));
        }
        let indices = index
            .data
            .chunks_exact(4)
            .take(count as usize)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        self.draw(primitive, indices)
    }

    // ===== READ-BACK =====

    fn read_color_bgra8(&mut self, framebuffer: Option<&FramebufferId>, rect: Rect) -> Result<Vec<u8>> {
        let pixels = self.read_region(
            framebuffer,
            rect,
            |image, offset| match &image.pixels {
                Pixels::Rgba(p) => Some([p[offset][2], p[offset][1], p[offset][0], p[offset][3]]),
                _ => None,
            },
            |fb| fb.colors[0],
        )?;
        Ok(pixels.into_iter().flatten().collect())
    }

    fn read_integer(&mut self, framebuffer: Option<&FramebufferId>, attachment: u32, rect: Rect) -> Result<Vec<u32>> {
        self.read_region(
            framebuffer,
            rect,
            |image, offset| match &image.pixels {
                Pixels::Uint(p) => Some(p[offset]),
                _ => None,
            },
            |fb| fb.colors.get(attachment as usize).copied().flatten(),
        )
    }

    fn read_depth(&mut self, framebuffer: Option<&FramebufferId>, rect: Rect) -> Result<Vec<f32>> {
        self.read_region(
            framebuffer,
            rect,
            |image, offset| match &image.pixels {
                Pixels::Depth { depth, .. } => Some(depth[offset]),
                _ => None,
            },
            |fb| fb.depth,
        )
    }

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()> {
        self.stats.frames_presented += 1;
        self.record("present".to_string());
        Ok(())
    }
}

fn image_offset(width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return None;
    }
    Some(y as usize * width as usize + x as usize)
}

#[cfg(test)]
#[path = "headless_device_tests.rs"]
mod tests;
