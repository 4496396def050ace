/// Mesh - a drawable unit: streams, transform, material and handlers

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use crate::device::{
    BufferId, CapabilityTier, CullFace, GraphicsDevice, PolygonMode, Primitive, TextureId, VertexArrayId,
};
use crate::error::{Error, Result};
use crate::picking::CpuPickingBuffer;
use crate::scene::{MeshKey, RenderTargetKey, TextureKey};
use crate::shader::{LegacyDraw, MeshUniforms, Shader, ShaderMask, DEPTH_BUFFER, TEXTURE0};
use crate::stream::{IndexStream, ScalarStream, VectorStream, VertexStream};
use crate::texture::Color;
use crate::window::{HandlerId, MeshEventHandler};
use crate::{engine_bail, engine_err, engine_trace};

/// Texture sampled by a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    /// Image texture of the scene
    Image(TextureKey),
    /// Color (unit 0) and depth (unit 1) of a render target
    RenderTarget(RenderTargetKey),
}

/// GPU textures resolved for one draw
#[derive(Debug, Clone, Copy)]
pub enum BoundTexture<'a> {
    Image(&'a TextureId),
    RenderBuffer { color: &'a TextureId, depth: &'a TextureId },
}

/// Per-draw inputs supplied by the render cycle
pub struct DrawContext<'a> {
    pub tier: CapabilityTier,
    pub shader: &'a Shader,
    /// World matrix of the mesh
    pub model: Mat4,
    /// Camera matrix (projection included)
    pub view: Mat4,
    pub screen: (u32, u32),
    pub texture: Option<BoundTexture<'a>>,
    /// CPU id buffer for Legacy picking draws
    pub picking: Option<&'a mut CpuPickingBuffer>,
}

/// Rasterization mode implied by an index primitive
pub fn polygon_for_primitive(primitive: Option<Primitive>) -> PolygonMode {
    match primitive {
        None | Some(Primitive::Points) => PolygonMode::Point,
        Some(Primitive::Triangles) | Some(Primitive::TriangleStrip) => PolygonMode::Fill,
        Some(_) => PolygonMode::Line,
    }
}

/// Depth range keeping points in front of lines in front of faces
pub fn depth_range_for(polygon: PolygonMode) -> (f32, f32) {
    match polygon {
        PolygonMode::Point => (0.0, 1.0 - 2.0 / 64.0),
        PolygonMode::Line => (0.0, 1.0 - 1.0 / 64.0),
        PolygonMode::Fill => (0.0, 1.0),
    }
}

/// Drawable unit
///
/// A mesh owns its vertex stream and optional index, scalar and vector
/// streams. Textures and the parent mesh are referenced by key; the parent
/// only contributes its world matrix.
pub struct Mesh {
    label: String,
    show: i32,
    position: Vec3,
    /// Degrees: roll (x), pitch (y), yaw (z)
    rotation: Vec3,
    scale: Vec3,
    size: f32,
    primary: Color,
    secondary: Color,
    self_illumination: f32,
    culling: i32,
    point_size: f32,
    line_width: f32,
    shaders: ShaderMask,
    blit: Vec3,
    scalar_range: Vec2,
    texture_blend: f32,
    texture: Option<TextureBinding>,
    parent: Option<MeshKey>,
    picking_id: u32,

    vertices: VertexStream,
    index: Option<IndexStream>,
    scalars: Option<ScalarStream>,
    vectors: Option<VectorStream>,

    vertex_array: Option<VertexArrayId>,
    vertex_array_sources: [u32; 4],
    retired: Vec<BufferId>,

    handlers: Vec<(HandlerId, Box<dyn MeshEventHandler>)>,
}

impl Mesh {
    pub fn new(vertices: VertexStream) -> Self {
        Self {
            label: String::new(),
            show: 1,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            size: 1.0,
            primary: Color::rgba(0, 0, 0, 255),
            secondary: Color::rgba(255, 255, 255, 0),
            self_illumination: 0.0,
            culling: 0,
            point_size: 5.0,
            line_width: 1.0,
            shaders: ShaderMask::empty(),
            blit: Vec3::ZERO,
            scalar_range: Vec2::new(0.0, 1.0),
            texture_blend: 1.0,
            texture: None,
            parent: None,
            picking_id: 0,
            vertices,
            index: None,
            scalars: None,
            vectors: None,
            vertex_array: None,
            vertex_array_sources: [0; 4],
            retired: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexStream) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_shaders(mut self, shaders: ShaderMask) -> Self {
        self.shaders = shaders;
        self
    }

    pub fn with_primary(mut self, color: Color) -> Self {
        self.primary = color;
        self
    }

    // ===== GETTERS =====

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Visibility; a mesh with `show <= 0` is never drawn
    pub fn show(&self) -> i32 {
        self.show
    }

    pub fn is_visible(&self) -> bool {
        self.show > 0
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn primary(&self) -> Color {
        self.primary
    }

    pub fn secondary(&self) -> Color {
        self.secondary
    }

    pub fn self_illumination(&self) -> f32 {
        self.self_illumination
    }

    pub fn culling(&self) -> i32 {
        self.culling
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Shaders allowed to draw this mesh
    pub fn shaders(&self) -> ShaderMask {
        self.shaders
    }

    pub fn blit(&self) -> Vec3 {
        self.blit
    }

    pub fn scalar_range(&self) -> Vec2 {
        self.scalar_range
    }

    pub fn texture_blend(&self) -> f32 {
        self.texture_blend
    }

    pub fn texture(&self) -> Option<TextureBinding> {
        self.texture
    }

    pub fn parent(&self) -> Option<MeshKey> {
        self.parent
    }

    /// Id written by the picking pass, 0 before the mesh joins a scene
    pub fn picking_id(&self) -> u32 {
        self.picking_id
    }

    pub fn vertices(&self) -> &VertexStream {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut VertexStream {
        &mut self.vertices
    }

    pub fn index(&self) -> Option<&IndexStream> {
        self.index.as_ref()
    }

    pub fn index_mut(&mut self) -> Option<&mut IndexStream> {
        self.index.as_mut()
    }

    pub fn scalars(&self) -> Option<&ScalarStream> {
        self.scalars.as_ref()
    }

    pub fn scalars_mut(&mut self) -> Option<&mut ScalarStream> {
        self.scalars.as_mut()
    }

    pub fn vectors(&self) -> Option<&VectorStream> {
        self.vectors.as_ref()
    }

    pub fn vectors_mut(&mut self) -> Option<&mut VectorStream> {
        self.vectors.as_mut()
    }

    pub fn vertex_array(&self) -> Option<&VertexArrayId> {
        self.vertex_array.as_ref()
    }

    // ===== SETTERS =====

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_show(&mut self, show: i32) {
        self.show = show;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    pub fn set_primary(&mut self, color: Color) {
        self.primary = color;
    }

    pub fn set_secondary(&mut self, color: Color) {
        self.secondary = color;
    }

    pub fn set_self_illumination(&mut self, value: f32) {
        self.self_illumination = value;
    }

    /// Positive culls back faces, negative culls front faces, 0 disables culling
    pub fn set_culling(&mut self, culling: i32) {
        self.culling = culling;
    }

    pub fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    pub fn set_shaders(&mut self, shaders: ShaderMask) {
        self.shaders = shaders;
    }

    /// Pixel offset added to the translation (x and y in screen pixels)
    pub fn set_blit(&mut self, blit: Vec3) {
        self.blit = blit;
    }

    pub fn set_scalar_range(&mut self, min: f32, max: f32) {
        self.scalar_range = Vec2::new(min, max);
    }

    pub fn set_texture_blend(&mut self, blend: f32) {
        self.texture_blend = blend;
    }

    pub fn set_texture(&mut self, texture: Option<TextureBinding>) {
        self.texture = texture;
    }

    /// Parent whose world matrix prefixes this mesh's local matrix
    pub fn set_parent(&mut self, parent: Option<MeshKey>) {
        self.parent = parent;
    }

    pub(crate) fn set_picking_id(&mut self, id: u32) {
        self.picking_id = id;
    }

    /// Replace the index stream; the previous GPU buffer is released at the next sync
    pub fn set_index(&mut self, index: Option<IndexStream>) {
        if let Some(mut old) = std::mem::replace(&mut self.index, index) {
            self.retired.extend(old.take_buffer());
        }
    }

    pub fn set_scalars(&mut self, scalars: Option<ScalarStream>) {
        if let Some(mut old) = std::mem::replace(&mut self.scalars, scalars) {
            self.retired.extend(old.take_buffer());
        }
    }

    pub fn set_vectors(&mut self, vectors: Option<VectorStream>) {
        if let Some(mut old) = std::mem::replace(&mut self.vectors, vectors) {
            self.retired.extend(old.take_buffer());
        }
    }

    pub fn set_vertices(&mut self, vertices: VertexStream) {
        let mut old = std::mem::replace(&mut self.vertices, vertices);
        self.retired.extend(old.take_buffer());
    }

    /// Remap texture coordinates onto one cell of a texture mosaic
    pub fn texture_slab(&mut self, row: u32, col: u32, rows: u32, cols: u32) {
        self.vertices.texture_slab(row, col, rows, cols);
    }

    // ===== TRANSFORMS =====

    /// T(position) · Rz(yaw) · Ry(pitch) · Rx(roll) · S(scale * size)
    pub fn local_matrix(&self) -> Mat4 {
        let r = self.rotation;
        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            r.z.to_radians(),
            r.y.to_radians(),
            r.x.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale * self.size, rotation, self.position)
    }

    /// Local matrix with the blit offset applied for a screen size
    ///
    /// The x and y blit offsets are pixels, both normalized by the screen
    /// width; z is added unchanged.
    pub fn transformation_matrix(&self, screen: (u32, u32)) -> Mat4 {
        let mut matrix = self.local_matrix();
        if self.blit != Vec3::ZERO {
            let width = screen.0.max(1) as f32;
            matrix.w_axis.x += 2.0 * self.blit.x / width;
            matrix.w_axis.y += 2.0 * self.blit.y / width;
            matrix.w_axis.z += self.blit.z;
        }
        matrix
    }

    /// Axis-aligned bounds of the vertices under a world matrix
    pub fn bounds(&self, model: Mat4) -> Option<(Vec3, Vec3)> {
        let mut points = self.vertices.as_slice().iter().map(|v| model.transform_point3(v.position));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    // ===== GEOMETRY =====

    /// Recompute smooth vertex normals from a triangle index
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedPrimitive` when the mesh has no triangle index;
    /// the normals are left untouched.
    pub fn calculate_normals(&mut self) -> Result<()> {
        let Some(index) = self.index.as_ref().filter(|i| i.primitive() == Primitive::Triangles) else {
            let primitive = self.index.as_ref().map(|i| format!("{:?}", i.primitive()));
            engine_bail!(
                "glw::Mesh",
                error = Error::UnsupportedPrimitive(format!(
                    "normals need a Triangles index, mesh '{}' has {}",
                    self.label,
                    primitive.as_deref().unwrap_or("none")
                ))
            );
        };

        let count = self.vertices.len();
        let mut normals = vec![Vec3::ZERO; count];
        for triangle in index.as_slice().chunks_exact(3) {
            let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            if a >= count || b >= count || c >= count {
                engine_bail!(
                    "glw::Mesh",
                    error = Error::IndexError { index: a.max(b).max(c), length: count }
                );
            }
            let vertices = self.vertices.as_slice();
            let (pa, pb, pc) = (vertices[a].position, vertices[b].position, vertices[c].position);
            let normal = (pb - pa).cross(pc - pa);
            for i in [a, b, c] {
                normals[i] += normal;
            }
        }

        for (vertex, normal) in self.vertices.as_mut_slice().iter_mut().zip(normals) {
            vertex.normal = normal.normalize_or_zero();
        }
        Ok(())
    }

    // ===== HANDLERS =====

    pub fn add_handler(&mut self, handler: impl MeshEventHandler + 'static) -> HandlerId {
        let id = HandlerId::next();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn take_handlers(&mut self) -> Vec<(HandlerId, Box<dyn MeshEventHandler>)> {
        std::mem::take(&mut self.handlers)
    }

    /// Put handlers back after a dispatch, keeping any added meanwhile
    pub(crate) fn restore_handlers(&mut self, mut handlers: Vec<(HandlerId, Box<dyn MeshEventHandler>)>) {
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
    }

    // ===== DRAWING =====

    /// Polygon mode for a shader: the shader's, or the one implied by the index
    pub fn polygon_for(&self, shader: &Shader) -> PolygonMode {
        shader
            .polygon()
            .unwrap_or_else(|| polygon_for_primitive(self.index.as_ref().map(|i| i.primitive())))
    }

    /// Primitive submitted for a shader
    pub fn draw_primitive(&self, shader: &Shader) -> Primitive {
        match &self.index {
            Some(index) if shader.polygon() != Some(PolygonMode::Point) => index.primitive(),
            _ => Primitive::Points,
        }
    }

    /// Uniform block for one draw
    pub fn uniforms(&self, ctx: &DrawContext<'_>) -> MeshUniforms {
        let ambient = ctx.shader.ambient();
        let alpha = (ambient.a as f32 + 255.0 * self.self_illumination).clamp(0.0, 255.0) as u8;
        MeshUniforms {
            model_view_proj: ctx.view * ctx.model,
            view: ctx.view,
            model: ctx.model,
            primary_color: self.primary.to_vec4(),
            secondary_color: self.secondary.to_vec4(),
            ambient_light: ambient.with_alpha(alpha).to_vec4(),
            light_direction: ctx.shader.light_direction(),
            screen_size: Vec2::new(ctx.screen.0 as f32, ctx.screen.1 as f32),
            culling: self.culling,
            picking_id: self.picking_id as i32,
            scalar_range: self.scalar_range,
            self_illumination: self.self_illumination,
            texture_blend: if ctx.texture.is_some() { self.texture_blend } else { 1.0 },
        }
    }

    /// Upload every dirty stream and release buffers of replaced streams
    pub fn sync_streams(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        for buffer in self.retired.drain(..) {
            device.delete_buffer(buffer);
        }
        self.vertices.sync(device)?;
        if let Some(index) = &mut self.index {
            index.sync(device)?;
        }
        if let Some(scalars) = &mut self.scalars {
            scalars.sync(device)?;
        }
        if let Some(vectors) = &mut self.vectors {
            vectors.sync(device)?;
        }
        Ok(())
    }

    fn buffer_sources(&self) -> [u32; 4] {
        let raw = |b: Option<&BufferId>| b.map(BufferId::raw).unwrap_or(0);
        [
            raw(self.vertices.buffer()),
            raw(self.index.as_ref().and_then(|i| i.buffer())),
            raw(self.scalars.as_ref().and_then(|s| s.buffer())),
            raw(self.vectors.as_ref().and_then(|v| v.buffer())),
        ]
    }

    fn bind_fixed_state(&self, device: &mut dyn GraphicsDevice, polygon: PolygonMode) {
        device.set_cull_face(match self.culling {
            c if c > 0 => Some(CullFace::Back),
            c if c < 0 => Some(CullFace::Front),
            _ => None,
        });
        device.set_point_size(self.point_size);
        device.set_line_width(self.line_width);
        device.set_polygon_mode(polygon);
        let (near, far) = depth_range_for(polygon);
        device.set_depth_range(near, far);
    }

    fn bind_textures(&self, device: &mut dyn GraphicsDevice, shader: &Shader, texture: Option<BoundTexture<'_>>) {
        match texture {
            Some(BoundTexture::Image(id)) => {
                device.bind_texture(0, Some(id));
                shader.set_sampler(device, TEXTURE0, 0);
            }
            Some(BoundTexture::RenderBuffer { color, depth }) => {
                device.bind_texture(0, Some(color));
                shader.set_sampler(device, TEXTURE0, 0);
                device.bind_texture(1, Some(depth));
                shader.set_sampler(device, DEPTH_BUFFER, 1);
            }
            None => device.bind_texture(0, None),
        }
    }

    /// Synchronize the streams and draw the mesh with the current program
    ///
    /// The vertex input path follows the capability tier: Modern keeps a
    /// vertex array rebuilt only when a buffer identity changes,
    /// Programmable binds attributes on every draw and Legacy hands the
    /// mesh to the shader's legacy callback.
    pub fn draw(&mut self, device: &mut dyn GraphicsDevice, mut ctx: DrawContext<'_>) -> Result<()> {
        self.sync_streams(device)?;
        if self.vertices.is_empty() {
            return Ok(());
        }

        let polygon = self.polygon_for(ctx.shader);
        self.bind_fixed_state(device, polygon);

        if ctx.tier == CapabilityTier::Legacy {
            let Some(renderer) = ctx.shader.legacy_renderer() else {
                engine_bail!(
                    "glw::Mesh",
                    error = Error::InvalidResource("legacy draw without a legacy renderer".to_string())
                );
            };
            let mut draw = LegacyDraw {
                device,
                mesh: self,
                model: ctx.model,
                view: ctx.view,
                screen: ctx.screen,
                picking: ctx.picking.take(),
            };
            return renderer.draw(&mut draw);
        }

        let uniforms = self.uniforms(&ctx);
        ctx.shader.apply_uniforms(device, &uniforms);
        self.bind_textures(device, ctx.shader, ctx.texture);

        if ctx.tier == CapabilityTier::Modern {
            let sources = self.buffer_sources();
            if self.vertex_array.is_none() || sources != self.vertex_array_sources {
                if let Some(old) = self.vertex_array.take() {
                    device.delete_vertex_array(old);
                }
                let attributes = self.attributes();
                let index = self.index.as_ref().and_then(|i| i.buffer());
                let vertex_array = device.create_vertex_array(&attributes, index)?;
                engine_trace!("glw::Mesh", "Vertex array {} built for '{}'", vertex_array.raw(), self.label);
                self.vertex_array = Some(vertex_array);
                self.vertex_array_sources = sources;
            }
            device.bind_vertex_array(self.vertex_array.as_ref());
        } else {
            let attributes = self.attributes();
            let index = self.index.as_ref().and_then(|i| i.buffer());
            device.bind_attributes(&attributes, index)?;
        }

        let primitive = self.draw_primitive(ctx.shader);
        let result = match &self.index {
            Some(index) if index.buffer().is_some() => device.draw_elements(primitive, index.uploaded_len() as u32),
            Some(index) => device.draw_arrays(index.primitive(), 0, self.vertices.len() as u32),
            None => device.draw_arrays(Primitive::Points, 0, self.vertices.len() as u32),
        };
        if ctx.tier == CapabilityTier::Modern {
            device.bind_vertex_array(None);
        }
        result.map_err(|err| engine_err!("glw::Mesh", "Draw of '{}' failed: {}", self.label, err))
    }

    fn attributes(&self) -> Vec<crate::device::VertexAttribute<'_>> {
        let mut attributes = self.vertices.attributes();
        if let Some(scalars) = &self.scalars {
            attributes.extend(scalars.attributes());
        }
        if let Some(vectors) = &self.vectors {
            attributes.extend(vectors.attributes());
        }
        attributes
    }

    /// Release every GPU object owned by the mesh
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for buffer in self.retired.drain(..) {
            device.delete_buffer(buffer);
        }
        if let Some(vertex_array) = self.vertex_array.take() {
            device.delete_vertex_array(vertex_array);
        }
        self.vertex_array_sources = [0; 4];
        self.vertices.release(device);
        if let Some(index) = &mut self.index {
            index.release(device);
        }
        if let Some(scalars) = &mut self.scalars {
            scalars.release(device);
        }
        if let Some(vectors) = &mut self.vectors {
            vectors.release(device);
        }
    }

    /// Whether the mesh still holds GPU objects
    pub fn has_gpu_objects(&self) -> bool {
        self.vertex_array.is_some()
            || !self.retired.is_empty()
            || self.vertices.buffer().is_some()
            || self.index.as_ref().is_some_and(|i| i.buffer().is_some())
            || self.scalars.as_ref().is_some_and(|s| s.buffer().is_some())
            || self.vectors.as_ref().is_some_and(|v| v.buffer().is_some())
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("label", &self.label)
            .field("show", &self.show)
            .field("picking_id", &self.picking_id)
            .field("vertices", &self.vertices.len())
            .field("shaders", &self.shaders)
            .field("parent", &self.parent)
            .finish()
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
