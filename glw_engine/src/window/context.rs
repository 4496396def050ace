/// Window context - the owner of everything one window draws.
///
/// A context holds the graphics device of its window, the scene, the
/// shader table, the picking buffer and the auxiliary buffer used by
/// multipass shaders. All GPU objects are created through its device and
/// released by it before the device goes away.

use std::path::PathBuf;
use glam::{Mat4, Vec3};
use crate::config::{EngineConfig, WindowConfig, SHADER_TABLE_SIZE};
use crate::device::{CapabilityTier, ClearFlags, ClearValues, GraphicsDevice, Rect, StencilState};
use crate::error::{Error, Result};
use crate::frame::{FramebufferTarget, Viewport};
use crate::mesh::{BoundTexture, DrawContext, Mesh, TextureBinding};
use crate::picking::PickingBuffer;
use crate::scene::{CameraKey, FrameKey, MeshKey, RenderTargetKey, Scene, TextureKey};
use crate::shader::{default_shaders, LegacyRenderer, Shader, ShaderMask, ShaderTable, ShaderTarget};
use crate::shapes;
use crate::target::{RenderBuffer, RenderTarget};
use crate::texture::{Color, Texture};
use crate::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use super::event::{
    CameraEventHandler, EventContext, InputEvent, KeyAction, MeshEvent, MeshEventHandler, PickingAccess,
    PointerState,
};

/// Where a window is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Created, opened at the start of the next render cycle
    Pending,
    Open,
    /// Close requested, torn down at the start of the next render cycle
    Closing,
    Closed,
}

/// Mesh found under a window pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub mesh: MeshKey,
    /// Vertex nearest to the pixel (Modern tier only)
    pub vertex: Option<u32>,
    pub depth: f32,
}

/// One window: device, scene, shaders and picking
pub struct WindowContext {
    title: String,
    width: u32,
    height: u32,
    background: Color,
    state: WindowState,
    resized: bool,
    load_default_shaders: bool,
    shaders_path: PathBuf,

    device: Option<Box<dyn GraphicsDevice>>,
    tier: CapabilityTier,
    version: u32,

    scene: Scene,
    shaders: ShaderTable,
    picking: PickingBuffer,
    auxiliary: RenderBuffer,
    quad: Mesh,

    pointer: PointerState,
    hovered: Option<MeshKey>,
}

impl WindowContext {
    /// Window drawing through `device`; it opens at the first render cycle
    pub fn new(engine: &EngineConfig, config: WindowConfig, device: Box<dyn GraphicsDevice>) -> Self {
        let tier = device.capability();
        let mut scene = Scene::new(engine.max_meshes, engine.max_cameras);
        scene.set_screen(config.width, config.height);
        Self {
            title: config.title,
            width: config.width,
            height: config.height,
            background: config.background,
            state: WindowState::Pending,
            resized: true,
            load_default_shaders: config.load_default_shaders,
            shaders_path: engine.shaders_path.clone(),
            device: Some(device),
            tier,
            version: 0,
            scene,
            shaders: ShaderTable::new(),
            picking: PickingBuffer::for_tier(tier),
            auxiliary: RenderBuffer::new(),
            quad: shapes::quad01(),
            pointer: PointerState::default(),
            hovered: None,
        }
    }

    // ===== GETTERS =====

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == WindowState::Open
    }

    /// Capability tier negotiated when the window opened
    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// API version reported by the device (`major * 10 + minor`), 0 before opening
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn device(&self) -> Option<&dyn GraphicsDevice> {
        self.device.as_deref()
    }

    pub fn device_mut(&mut self) -> Option<&mut (dyn GraphicsDevice + 'static)> {
        self.device.as_deref_mut()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn shaders(&self) -> &ShaderTable {
        &self.shaders
    }

    pub fn picking_buffer(&self) -> &PickingBuffer {
        &self.picking
    }

    pub fn auxiliary_buffer(&self) -> &RenderBuffer {
        &self.auxiliary
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    /// Mesh under the cursor after the last pointer event
    pub fn hovered(&self) -> Option<MeshKey> {
        self.hovered
    }

    // ===== SETTERS =====

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    /// New window size; size-dependent buffers follow at the next cycle
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.scene.set_screen(width, height);
        if let Some(device) = self.device.as_deref_mut() {
            device.resize_surface(width, height);
        }
        self.resized = true;
    }

    /// Close at the start of the next render cycle
    pub fn request_close(&mut self) {
        if self.state != WindowState::Closed {
            self.state = WindowState::Closing;
        }
    }

    // ===== LIFECYCLE =====

    fn device_or_err(device: &mut Option<Box<dyn GraphicsDevice>>) -> Result<&mut (dyn GraphicsDevice + 'static)> {
        device
            .as_deref_mut()
            .ok_or_else(|| engine_err!("glw::Window", error = Error::InvalidResource("window device released".to_string())))
    }

    /// Query the device and install the default shader set
    pub fn open(&mut self) -> Result<()> {
        let device = Self::device_or_err(&mut self.device)?;
        self.tier = device.capability();
        self.version = device.version();
        if device.surface_size() != (self.width, self.height) {
            device.resize_surface(self.width, self.height);
        }
        self.picking = PickingBuffer::for_tier(self.tier);

        if self.load_default_shaders {
            for shader in default_shaders(self.tier, &self.shaders_path) {
                if let Some(mut old) = self.shaders.install(shader)? {
                    old.release(device);
                }
            }
        }

        engine_info!(
            "glw::Window",
            "Window '{}' opened ({}x{}, version {}, {:?} tier)",
            self.title,
            self.width,
            self.height,
            self.version,
            self.tier
        );
        self.state = WindowState::Open;
        self.resized = true;
        Ok(())
    }

    /// Resolve a pending open or close; returns whether the window renders this cycle
    pub fn begin(&mut self) -> bool {
        match self.state {
            WindowState::Pending => match self.open() {
                Ok(()) => true,
                Err(err) => {
                    engine_error!("glw::Window", "Window '{}' failed to open: {}", self.title, err);
                    self.state = WindowState::Closed;
                    false
                }
            },
            WindowState::Open => true,
            WindowState::Closing => {
                self.release_gpu();
                self.state = WindowState::Closed;
                engine_info!("glw::Window", "Window '{}' closed", self.title);
                false
            }
            WindowState::Closed => false,
        }
    }

    /// Size every window-dependent buffer to the window
    ///
    /// No GPU object is recreated for buffers already at the right size.
    pub fn regenerate(&mut self) -> Result<()> {
        let device = Self::device_or_err(&mut self.device)?;
        let (width, height) = (self.width, self.height);
        self.picking.regenerate(device, width, height)?;
        if !self.auxiliary.is_generated() || self.auxiliary.size() != (width, height) {
            self.auxiliary.generate(device, width, height)?;
        }
        for (_, target) in self.scene.targets.iter_mut() {
            if target.is_screen_bound() {
                target.update(device, (width, height))?;
            }
        }
        self.resized = false;
        Ok(())
    }

    /// Release every GPU object the window owns
    ///
    /// Entities stay in the scene; a released window cannot render again.
    fn release_gpu(&mut self) {
        let Some(device) = self.device.as_deref_mut() else {
            return;
        };
        self.scene.release_all(device);
        self.shaders.release_all(device);
        self.picking.release(device);
        self.auxiliary.release(device);
        self.quad.release(device);
        let leaked = device.stats().live_objects();
        if leaked > 0 {
            engine_warn!("glw::Window", "{} GPU objects still alive after releasing '{}'", leaked, self.title);
        }
    }

    /// Release every GPU object and hand back the device
    pub fn teardown(mut self) -> Option<Box<dyn GraphicsDevice>> {
        self.release_gpu();
        self.state = WindowState::Closed;
        self.device.take()
    }

    // ===== RENDER CYCLE =====

    /// Draw one frame
    ///
    /// Loads pending shaders, regenerates resized buffers, clears the
    /// picking buffer and the window, renders every render target's frames
    /// then the window frames, and presents.
    pub fn render(&mut self) -> Result<()> {
        if self.state != WindowState::Open {
            engine_bail!(
                "glw::Window",
                error = Error::InvalidResource(format!("window '{}' is not open ({:?})", self.title, self.state))
            );
        }
        {
            let device = Self::device_or_err(&mut self.device)?;
            self.shaders.load_pending(device);
        }
        if self.resized {
            self.regenerate()?;
        }
        self.scene.sort_frames();

        let screen = (self.width, self.height);
        let background = self.background;
        let device = Self::device_or_err(&mut self.device)?;

        for (_, target) in self.scene.targets.iter_mut() {
            if let Err(err) = target.update(device, screen) {
                engine_warn!("glw::Window", "Render target '{}' skipped: {}", target.label(), err);
            }
        }
        if self.picking.is_allocated() {
            self.picking.clear(device)?;
        }

        let mut cycle = RenderCycle {
            device,
            scene: &mut self.scene,
            shaders: &self.shaders,
            picking: &mut self.picking,
            auxiliary: &mut self.auxiliary,
            quad: &mut self.quad,
            tier: self.tier,
        };

        cycle.device.bind_framebuffer(None);
        cycle.device.set_draw_buffers(1);
        cycle.device.set_viewport(Rect::full(screen.0, screen.1));
        cycle.device.set_scissor(None);
        cycle.device.set_stencil(None);
        cycle.device.set_depth_mask(true);
        cycle.device.clear(
            ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            ClearValues::color(background.to_vec4()),
        );

        let targets: Vec<RenderTargetKey> = cycle.scene.targets.keys().collect();
        for key in targets {
            let Some(target) = cycle.scene.targets.get(key) else { continue };
            if !target.buffer().is_generated() || target.clear(cycle.device).is_err() {
                continue;
            }
            let parent = target.viewport(key);
            let frames = cycle.scene.target_frames(key).to_vec();
            cycle.render_frames(&frames, parent);
        }

        let frames = cycle.scene.screen_frames().to_vec();
        cycle.render_frames(&frames, Viewport::window(screen.0, screen.1));

        cycle.device.set_stencil(None);
        cycle.device.bind_framebuffer(None);
        cycle.device.present()?;
        let code = cycle.device.check_error();
        if code != 0 {
            let err = Error::GraphicsApi { code, operation: "render".to_string() };
            engine_error!("glw::Window", "{}", err);
        }
        Ok(())
    }

    // ===== SHADERS =====

    /// First free user shader slot
    pub fn request_shader_slot(&self) -> Option<ShaderMask> {
        self.shaders.request_slot()
    }

    /// Put a shader in the first free user slot and return its mask
    ///
    /// The program is built right away when the window is open, otherwise
    /// at the next render cycle. A build failure is logged and leaves the
    /// slot unloaded.
    pub fn load_shader(&mut self, shader: Shader) -> Result<ShaderMask> {
        let mask = self.shaders.insert_user(shader)?;
        self.load_now(mask);
        Ok(mask)
    }

    /// Put a shader in the slot named by its own mask, releasing the previous one
    pub fn install_shader(&mut self, shader: Shader) -> Result<()> {
        let mask = shader.mask();
        if let Some(mut old) = self.shaders.install(shader)? {
            if let Some(device) = self.device.as_deref_mut() {
                old.release(device);
            }
        }
        self.load_now(mask);
        Ok(())
    }

    /// Shader drawn by an application callback (Legacy tier)
    pub fn load_legacy_shader(&mut self, renderer: impl LegacyRenderer + 'static) -> Result<ShaderMask> {
        self.load_shader(Shader::legacy(renderer))
    }

    /// Append a post-process pass to a shader; built at the next cycle
    pub fn add_pass(
        &mut self,
        mask: ShaderMask,
        directory: impl Into<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Result<()> {
        let Some(shader) = self.shaders.get_mut(mask) else {
            engine_bail!(
                "glw::Window",
                error = Error::InvalidResource(format!("no shader in slot {:#x}", mask.bits()))
            );
        };
        shader.add_pass(directory, fragment);
        Ok(())
    }

    pub fn shader_mut(&mut self, mask: ShaderMask) -> Option<&mut Shader> {
        self.shaders.get_mut(mask)
    }

    /// Remove a shader and release its programs
    pub fn remove_shader(&mut self, mask: ShaderMask) -> Option<Shader> {
        let mut shader = self.shaders.remove(mask)?;
        if let Some(device) = self.device.as_deref_mut() {
            shader.release(device);
        }
        Some(shader)
    }

    /// Rebuild every program at the next cycle
    pub fn reload_shaders(&mut self) {
        for (_, shader) in self.shaders.iter_mut() {
            shader.request_reload();
        }
    }

    fn load_now(&mut self, mask: ShaderMask) {
        if self.state != WindowState::Open {
            return;
        }
        if let (Some(device), Some(shader)) = (self.device.as_deref_mut(), self.shaders.get_mut(mask)) {
            if let Err(err) = shader.ensure_loaded(device) {
                engine_warn!("glw::Window", "Shader slot {:#x} not fully loaded: {}", mask.bits(), err);
            }
        }
    }

    // ===== ENTITIES =====

    /// Add a mesh to the scene
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshKey> {
        self.scene.add_mesh(mesh)
    }

    /// Remove a mesh and release its GPU objects
    pub fn remove_mesh(&mut self, key: MeshKey) -> Result<Mesh> {
        let device = Self::device_or_err(&mut self.device)?;
        if self.hovered == Some(key) {
            self.hovered = None;
        }
        self.scene.remove_mesh(device, key)
    }

    pub fn remove_texture(&mut self, key: TextureKey) -> Result<Texture> {
        let device = Self::device_or_err(&mut self.device)?;
        self.scene.remove_texture(device, key)
    }

    /// Add a render target sized now when it follows the window
    pub fn add_render_target(&mut self, target: RenderTarget) -> RenderTargetKey {
        self.scene.add_render_target(target)
    }

    pub fn remove_render_target(&mut self, key: RenderTargetKey) -> Result<()> {
        let device = Self::device_or_err(&mut self.device)?;
        self.scene.remove_render_target(device, key)
    }

    /// Let a camera receive the window's input events
    pub fn attach_camera(&mut self, camera: CameraKey) -> Result<()> {
        self.scene.attach_camera(camera)
    }

    /// Copy the color of a viewport into a render target
    pub fn blit_viewport_into(&mut self, viewport: Viewport, target: RenderTargetKey) -> Result<()> {
        let device = Self::device_or_err(&mut self.device)?;
        let screen = (self.width, self.height);
        let scene = &mut self.scene;
        scene.render_target_mut(target)?.update(device, screen)?;

        let source = match viewport.framebuffer {
            FramebufferTarget::Window => None,
            FramebufferTarget::Target(key) => match scene.targets.get(key).and_then(|t| t.buffer().framebuffer()) {
                Some(framebuffer) => Some(framebuffer),
                None => engine_bail!("glw::Window", "Viewport render target {:?} has no buffer", key),
            },
        };
        let destination = scene.render_target(target)?.buffer();
        let Some(framebuffer) = destination.framebuffer() else {
            engine_bail!("glw::Window", "Render target {:?} has no buffer", target);
        };
        device.blit_framebuffer(
            source,
            viewport.rect(),
            Some(framebuffer),
            Rect::full(destination.width(), destination.height()),
            ClearFlags::COLOR,
        )
    }

    // ===== PICKING =====

    fn clamp_to_window(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(0, self.width as i32 - 1), y.clamp(0, self.height as i32 - 1))
    }

    /// Whether the picking buffer holds a frame rendered at the current window size
    pub fn picking_is_current(&self) -> bool {
        !self.resized && self.picking.is_allocated() && self.picking.size() == (self.width, self.height)
    }

    /// Mesh under window pixel `(x, y)` (origin top-left), from the last rendered frame
    ///
    /// Coordinates are clamped to the window. Nothing is picked between a
    /// resize and the next rendered frame.
    pub fn picking(&mut self, x: i32, y: i32) -> Option<PickHit> {
        if !self.picking_is_current() {
            return None;
        }
        let (x, y) = self.clamp_to_window(x, y);
        let device = self.device.as_deref_mut()?;
        let hit = self.picking.read_pixel(device, x, y).ok()?;
        if hit.id == 0 {
            return None;
        }
        let mesh = self.scene.mesh_by_picking_id(hit.id)?;
        Some(PickHit { mesh, vertex: hit.vertex, depth: hit.depth })
    }

    /// Depths of the inclusive window rectangle between two corners, clamped to the window
    pub fn picking_box(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<Vec<f32>> {
        if !self.picking_is_current() {
            engine_bail!(
                "glw::Window",
                error = Error::InvalidResource(format!("picking buffer of '{}' not rendered at the window size", self.title))
            );
        }
        let (x0, y0) = self.clamp_to_window(x0, y0);
        let (x1, y1) = self.clamp_to_window(x1, y1);
        let device = Self::device_or_err(&mut self.device)?;
        self.picking.read_box(device, x0, y0, x1, y1)
    }

    /// Top-most active window frame containing a window point (origin top-left)
    pub fn frame_from_mouse(&self, x: f64, y: f64) -> Option<FrameKey> {
        let window = Viewport::window(self.width, self.height);
        self.scene
            .screen_frames()
            .iter()
            .rev()
            .copied()
            .find(|key| self.scene.frames.get(*key).is_some_and(|f| f.is_active() && f.contains(&window, x, y)))
    }

    // ===== EVENTS =====

    /// Route one input event
    ///
    /// Resize and close act on the window. Pointer events update the mesh
    /// under the cursor (enter/leave/click/release handlers) and then
    /// reach the handlers of every attached camera; key events reach the
    /// cameras only.
    pub fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::Resized { width, height } => self.resize(width, height),
            InputEvent::CloseRequested => self.request_close(),
            InputEvent::CursorMoved { x, y } => {
                self.pointer.position = (x, y);
                self.update_hover();
                let buttons = self.pointer.buttons;
                self.dispatch_cameras(true, |handler, ctx| handler.on_move(ctx, buttons));
            }
            InputEvent::MouseButton { button, action } => {
                let hit = self.pick_pointer();
                match action {
                    KeyAction::Press | KeyAction::Repeat => {
                        self.pointer.buttons.insert(button);
                        self.pointer.press = self.pointer.position;
                        self.dispatch_mesh(hit, |handler, event| handler.on_click(event));
                        self.dispatch_cameras(true, |handler, ctx| handler.on_click(ctx, button));
                    }
                    KeyAction::Release => {
                        self.pointer.buttons.remove(button);
                        self.dispatch_mesh(hit, |handler, event| handler.on_release(event));
                        self.dispatch_cameras(true, |handler, ctx| handler.on_release(ctx, button));
                    }
                }
            }
            InputEvent::Scroll { dx, dy } => {
                self.dispatch_cameras(true, |handler, ctx| handler.on_scroll(ctx, dx, dy));
            }
            InputEvent::Key { key, action } => {
                if action == KeyAction::Press {
                    self.pointer.press = self.pointer.position;
                }
                self.dispatch_cameras(false, |handler, ctx| handler.on_key(ctx, key, action));
            }
        }
    }

    fn pick_pointer(&mut self) -> Option<PickHit> {
        if !self.is_open() || !self.picking_is_current() {
            return None;
        }
        let (x, y) = self.pointer.position;
        self.picking(x as i32, y as i32)
    }

    fn update_hover(&mut self) {
        let hit = self.pick_pointer();
        let current = hit.map(|h| h.mesh);
        if current == self.hovered {
            return;
        }
        let previous = self.hovered.take();
        if let Some(previous) = previous {
            let left = PickHit { mesh: previous, vertex: None, depth: 1.0 };
            self.dispatch_mesh(Some(left), |handler, event| handler.on_leave(event));
        }
        self.dispatch_mesh(hit, |handler, event| handler.on_enter(event));
        self.hovered = current;
    }

    fn dispatch_mesh(&mut self, hit: Option<PickHit>, mut call: impl FnMut(&mut dyn MeshEventHandler, &mut MeshEvent<'_>)) {
        let Some(hit) = hit else { return };
        let Some(mesh) = self.scene.meshes.get_mut(hit.mesh) else { return };
        let mut handlers = mesh.take_handlers();
        if !handlers.is_empty() {
            let mut event = MeshEvent {
                key: hit.mesh,
                mesh: &mut *mesh,
                vertex: hit.vertex,
                buttons: self.pointer.buttons,
                position: self.pointer.position,
            };
            for (_, handler) in handlers.iter_mut() {
                call(handler.as_mut(), &mut event);
            }
        }
        mesh.restore_handlers(handlers);
    }

    /// Hand an event to the handlers of every attached camera
    ///
    /// With `pointer` set, a camera bound to a frame only sees events whose
    /// cursor lies inside that frame.
    fn dispatch_cameras(
        &mut self,
        pointer: bool,
        mut call: impl FnMut(&mut dyn CameraEventHandler, &mut EventContext<'_>),
    ) {
        let (x, y) = self.pointer.position;
        let under_cursor = self.frame_from_mouse(x, y);
        let window = Viewport::window(self.width, self.height);
        let screen = (self.width, self.height);
        let picked = self.hovered;
        let pointer_state = self.pointer;
        // handlers read nothing from a buffer left over from before a resize
        let detached = PickingBuffer::for_tier(self.tier);
        let picking = if self.picking_is_current() { &self.picking } else { &detached };
        let Some(device) = self.device.as_deref_mut() else { return };

        for key in self.scene.attached.clone() {
            let Some(camera) = self.scene.cameras.get_mut(key) else { continue };
            let boundary = camera.boundary_frame();
            if pointer && boundary.is_some() && boundary != under_cursor {
                continue;
            }
            let mut handlers = camera.take_handlers();
            let frame = boundary
                .or(under_cursor)
                .and_then(|f| self.scene.frames.get(f))
                .map(|f| f.calculate_viewport(&window))
                .unwrap_or(window);

            let mut ctx = EventContext {
                camera_key: key,
                scene: &mut self.scene,
                picking: PickingAccess { buffer: picking, device: &mut *device },
                frame,
                screen,
                pointer: pointer_state,
                picked,
            };
            for (_, handler) in handlers.iter_mut() {
                call(handler.as_mut(), &mut ctx);
            }
            if let Some(camera) = self.scene.cameras.get_mut(key) {
                camera.restore_handlers(handlers);
            }
        }
    }
}

impl Drop for WindowContext {
    fn drop(&mut self) {
        self.release_gpu();
    }
}

impl std::fmt::Debug for WindowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowContext")
            .field("title", &self.title)
            .field("size", &(self.width, self.height))
            .field("state", &self.state)
            .field("tier", &self.tier)
            .field("scene", &self.scene)
            .finish()
    }
}

// ============================================================================
// Render cycle
// ============================================================================

/// Borrowed pieces of a window for the duration of one render cycle
struct RenderCycle<'a> {
    device: &'a mut dyn GraphicsDevice,
    scene: &'a mut Scene,
    shaders: &'a ShaderTable,
    picking: &'a mut PickingBuffer,
    auxiliary: &'a mut RenderBuffer,
    quad: &'a mut Mesh,
    tier: CapabilityTier,
}

/// Model matrix stretching the unit quad over clip space
fn fullscreen_quad() -> Mat4 {
    Mat4::from_translation(Vec3::new(-1.0, -1.0, 0.0)) * Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0))
}

impl RenderCycle<'_> {
    /// Framebuffer size behind a viewport
    fn framebuffer_size(&self, viewport: &Viewport) -> Option<(u32, u32)> {
        match viewport.framebuffer {
            FramebufferTarget::Window => Some(self.device.surface_size()),
            FramebufferTarget::Target(key) => self.scene.targets.get(key).map(|t| t.buffer().size()),
        }
    }

    /// Bind the framebuffer of a viewport and restrict drawing to it
    fn bind_viewport(&mut self, viewport: &Viewport) -> bool {
        match viewport.framebuffer {
            FramebufferTarget::Window => self.device.bind_framebuffer(None),
            FramebufferTarget::Target(key) => {
                match self.scene.targets.get(key).and_then(|t| t.buffer().framebuffer()) {
                    Some(framebuffer) => self.device.bind_framebuffer(Some(framebuffer)),
                    None => return false,
                }
            }
        }
        self.device.set_draw_buffers(1);
        self.device.set_viewport(viewport.rect());
        self.device.set_scissor(Some(viewport.rect()));
        true
    }

    fn render_frames(&mut self, frames: &[FrameKey], parent: Viewport) {
        for &key in frames {
            if !self.scene.frames.get(key).is_some_and(|f| f.is_active()) {
                continue;
            }
            if !self.bind_viewport(&parent) {
                continue;
            }
            let Some(frame) = self.scene.frames.get(key) else { continue };
            let viewport = frame.clear(self.device, &parent);
            let cameras = self.scene.frame_cameras(key).to_vec();
            self.render_cameras(&cameras, viewport);
        }
    }

    /// Per-slot pipeline over the cameras of one frame
    fn render_cameras(&mut self, cameras: &[CameraKey], viewport: Viewport) {
        let (width, height) = viewport.size();
        if width == 0 || height == 0 {
            return;
        }

        let mut active = Vec::with_capacity(cameras.len());
        let mut usage = [0u32; SHADER_TABLE_SIZE];
        for &key in cameras {
            let Some(camera) = self.scene.cameras.get_mut(key) else { continue };
            if !camera.is_active() {
                continue;
            }
            camera.update_view(width, height);
            active.push(key);
            for mesh_key in self.scene.camera_meshes.members(key) {
                let Some(mesh) = self.scene.meshes.get(*mesh_key) else { continue };
                if !mesh.is_visible() {
                    continue;
                }
                let bits = mesh.shaders().bits();
                for (slot, count) in usage.iter_mut().enumerate() {
                    if bits & (1 << slot) != 0 {
                        *count += 1;
                    }
                }
            }
        }

        let shaders = self.shaders;
        for (slot, count) in usage.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let Some(shader) = shaders.slot(slot).filter(|s| s.is_drawable()) else {
                engine_error!("glw::Window", "Shader slot {} not loaded, {} draws skipped", slot, count);
                continue;
            };
            match shader.target() {
                ShaderTarget::Picking => self.draw_picking(shader, &active, &viewport),
                ShaderTarget::Screen if shader.passes().is_empty() => {
                    if self.bind_viewport(&viewport) {
                        self.draw_meshes(shader, &active, &viewport, false);
                    }
                }
                ShaderTarget::Screen => self.draw_multipass(shader, &active, &viewport),
            }
        }
        self.device.set_stencil(None);
    }

    /// Draw picking-targeted meshes into the picking buffer (window frames only)
    fn draw_picking(&mut self, shader: &Shader, cameras: &[CameraKey], viewport: &Viewport) {
        if viewport.framebuffer != FramebufferTarget::Window || !self.picking.is_allocated() {
            return;
        }
        match self.picking.framebuffer() {
            Some(framebuffer) => {
                self.device.bind_framebuffer(Some(framebuffer));
                self.device.set_draw_buffers(self.picking.draw_buffers());
                self.device.set_viewport(viewport.rect());
                self.device.set_scissor(Some(viewport.rect()));
            }
            None => {
                self.bind_viewport(viewport);
            }
        }
        self.draw_meshes(shader, cameras, viewport, true);
        self.bind_viewport(viewport);
    }

    /// Draw, tag in the stencil, copy to the auxiliary buffer and run every pass
    fn draw_multipass(&mut self, shader: &Shader, cameras: &[CameraKey], viewport: &Viewport) {
        let Some(size) = self.framebuffer_size(viewport) else { return };
        if !self.bind_viewport(viewport) {
            return;
        }
        self.device.set_depth_mask(true);
        self.device.clear(ClearFlags::STENCIL, ClearValues::default());
        self.device.set_stencil(Some(StencilState::tag(1)));
        self.draw_meshes(shader, cameras, viewport, false);
        self.device.set_stencil(None);

        if !self.auxiliary.is_generated() || self.auxiliary.size() != size {
            if let Err(err) = self.auxiliary.generate(self.device, size.0, size.1) {
                engine_error!("glw::Window", "Multipass skipped, auxiliary buffer unavailable: {}", err);
                return;
            }
        }
        let full = Rect::full(size.0, size.1);

        for pass in shader.passes() {
            if !pass.is_drawable() {
                engine_error!("glw::Window", "Pass {} not loaded, skipped", pass.fragment().display());
                continue;
            }
            // each pass samples what the previous one left in the framebuffer
            let source = match viewport.framebuffer {
                FramebufferTarget::Window => None,
                FramebufferTarget::Target(key) => self.scene.targets.get(key).and_then(|t| t.buffer().framebuffer()),
            };
            let copied = self.device.blit_framebuffer(
                source,
                full,
                self.auxiliary.framebuffer(),
                full,
                ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
            );
            if let Err(err) = copied {
                engine_error!("glw::Window", "Multipass stopped, viewport copy failed: {}", err);
                break;
            }
            self.bind_viewport(viewport);
            // the quad spans the framebuffer so its uv addresses the auxiliary copy
            self.device.set_viewport(full);
            self.device.set_stencil(Some(StencilState::equal(1)));
            if pass.use_program(self.device).is_err() {
                continue;
            }
            let (Some(color), Some(depth)) = (self.auxiliary.color(), self.auxiliary.depth()) else { continue };
            let ctx = DrawContext {
                tier: self.tier,
                shader: pass,
                model: fullscreen_quad(),
                view: Mat4::IDENTITY,
                screen: size,
                texture: Some(BoundTexture::RenderBuffer { color, depth }),
                picking: None,
            };
            if let Err(err) = self.quad.draw(self.device, ctx) {
                engine_debug!("glw::Window", "Pass {} failed: {}", pass.fragment().display(), err);
            }
        }
        self.device.set_stencil(None);
        self.bind_viewport(viewport);
    }

    /// Draw every visible mesh of the cameras that the shader may draw
    fn draw_meshes(&mut self, shader: &Shader, cameras: &[CameraKey], viewport: &Viewport, picking: bool) {
        if shader.use_program(self.device).is_err() {
            return;
        }
        let screen = viewport.size();
        for &camera in cameras {
            let Some(view) = self.scene.cameras.get(camera).map(|c| c.view_matrix()) else { continue };
            let meshes = self.scene.camera_meshes.members(camera).to_vec();
            for key in meshes {
                let Some(mesh) = self.scene.meshes.get(key) else { continue };
                if !mesh.is_visible() || !mesh.shaders().intersects(shader.mask()) {
                    continue;
                }
                let binding = mesh.texture();
                if let Some(TextureBinding::Image(texture)) = binding {
                    if let Some(texture) = self.scene.textures.get_mut(texture) {
                        if let Err(err) = texture.sync(self.device) {
                            engine_warn!("glw::Window", "Texture upload failed: {}", err);
                        }
                    }
                }
                let Ok(model) = self.scene.world_matrix(key) else { continue };

                let scene = &mut *self.scene;
                let texture = match binding {
                    Some(TextureBinding::Image(texture)) => {
                        scene.textures.get(texture).and_then(|t| t.handle()).map(BoundTexture::Image)
                    }
                    Some(TextureBinding::RenderTarget(target)) => scene.targets.get(target).and_then(|t| {
                        let buffer = t.buffer();
                        Some(BoundTexture::RenderBuffer { color: buffer.color()?, depth: buffer.depth()? })
                    }),
                    None => None,
                };
                let cpu_picking = if picking { self.picking.cpu_mut() } else { None };
                let Some(mesh) = scene.meshes.get_mut(key) else { continue };
                let ctx = DrawContext {
                    tier: self.tier,
                    shader,
                    model,
                    view,
                    screen,
                    texture,
                    picking: cpu_picking,
                };
                if let Err(err) = mesh.draw(self.device, ctx) {
                    engine_debug!("glw::Window", "Mesh '{}' skipped: {}", mesh.label(), err);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
