/// Shader program descriptor, lifecycle and multipass chain

use std::path::{Path, PathBuf};
use bitflags::bitflags;
use glam::Vec3;
use rustc_hash::FxHashMap;
use crate::device::{GraphicsDevice, PolygonMode, ProgramId, ProgramSource, UniformValue};
use crate::error::{Error, Result};
use crate::stream::locations;
use crate::texture::Color;
use crate::{engine_bail, engine_debug, engine_error};
use super::legacy::LegacyRenderer;
use super::mask::ShaderMask;
use super::uniforms::{MeshUniforms, UNIFORM_NAMES};

/// Vertex program shared by every post-process pass
pub const POSTPROCESS_VERTEX: &str = "postprocessing.vsh";

/// Framebuffer a shader draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderTarget {
    /// Current viewport framebuffer
    Screen,
    /// The window's picking buffer
    Picking,
}

bitflags! {
    /// Load status of a shader; empty means loaded and usable
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStatus: u32 {
        const LOAD_ERROR = 1;
        const CREATION = 1 << 1;
        const COMPILATION = 1 << 2;
        const LINK = 1 << 3;
        const VALIDATION = 1 << 4;
        const UNLOADED = 1 << 5;
        const OTHER = 1 << 8;
    }
}

impl ShaderStatus {
    pub const OK: ShaderStatus = ShaderStatus::empty();

    pub fn is_ok(self) -> bool {
        self.is_empty()
    }
}

/// One shader program and its post-process passes
///
/// A shader starts unloaded with its reload flag set. `load` compiles the
/// program (and every pass) on a device; a failure leaves it unloaded with
/// the failure bits in `status`. Draws against an unloaded shader are
/// skipped by the render cycle.
pub struct Shader {
    directory: PathBuf,
    vertex: PathBuf,
    fragment: PathBuf,
    geometry: Option<PathBuf>,
    mask: ShaderMask,
    target: ShaderTarget,
    polygon: Option<PolygonMode>,
    alpha_test: bool,
    depth_test: bool,
    ambient: Color,
    light_direction: Vec3,
    reload: bool,
    status: ShaderStatus,
    program: Option<ProgramId>,
    locations: FxHashMap<&'static str, i32>,
    passes: Vec<Shader>,
    legacy: Option<Box<dyn LegacyRenderer>>,
}

impl Shader {
    /// Shader from a directory and its vertex/fragment file names
    pub fn new(directory: impl Into<PathBuf>, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            geometry: None,
            mask: ShaderMask::empty(),
            target: ShaderTarget::Screen,
            polygon: None,
            alpha_test: true,
            depth_test: true,
            ambient: Color::rgba(255, 255, 255, 60),
            light_direction: Vec3::new(1.0, 1.0, -1.0),
            reload: true,
            status: ShaderStatus::UNLOADED,
            program: None,
            locations: FxHashMap::default(),
            passes: Vec::new(),
            legacy: None,
        }
    }

    /// Program-less shader drawn by an application callback on the Legacy tier
    pub fn legacy(renderer: impl LegacyRenderer + 'static) -> Self {
        let mut shader = Self::new("", "", "");
        shader.legacy = Some(Box::new(renderer));
        shader.reload = false;
        shader
    }

    pub fn with_geometry(mut self, geometry: impl Into<PathBuf>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    pub fn with_mask(mut self, mask: ShaderMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_target(mut self, target: ShaderTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_polygon(mut self, polygon: Option<PolygonMode>) -> Self {
        self.polygon = polygon;
        self
    }

    pub fn with_alpha_test(mut self, alpha_test: bool) -> Self {
        self.alpha_test = alpha_test;
        self
    }

    pub fn with_depth_test(mut self, depth_test: bool) -> Self {
        self.depth_test = depth_test;
        self
    }

    // ===== GETTERS =====

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn vertex(&self) -> &Path {
        &self.vertex
    }

    pub fn fragment(&self) -> &Path {
        &self.fragment
    }

    pub fn geometry(&self) -> Option<&Path> {
        self.geometry.as_deref()
    }

    pub fn mask(&self) -> ShaderMask {
        self.mask
    }

    pub fn target(&self) -> ShaderTarget {
        self.target
    }

    /// Rasterization override; `None` lets each mesh derive it from its primitive
    pub fn polygon(&self) -> Option<PolygonMode> {
        self.polygon
    }

    pub fn alpha_test(&self) -> bool {
        self.alpha_test
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn ambient(&self) -> Color {
        self.ambient
    }

    pub fn light_direction(&self) -> Vec3 {
        self.light_direction
    }

    pub fn needs_reload(&self) -> bool {
        self.reload || self.passes.iter().any(Shader::needs_reload)
    }

    pub fn status(&self) -> ShaderStatus {
        self.status
    }

    pub fn is_loaded(&self) -> bool {
        self.program.is_some()
    }

    /// Whether the render cycle can draw with this shader (program or legacy callback)
    pub fn is_drawable(&self) -> bool {
        self.program.is_some() || self.legacy.is_some()
    }

    pub fn program(&self) -> Option<&ProgramId> {
        self.program.as_ref()
    }

    /// Post-process passes, in execution order
    pub fn passes(&self) -> &[Shader] {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut [Shader] {
        &mut self.passes
    }

    pub fn legacy_renderer(&self) -> Option<&dyn LegacyRenderer> {
        self.legacy.as_deref()
    }

    // ===== SETTERS =====

    pub fn set_mask(&mut self, mask: ShaderMask) {
        self.mask = mask;
    }

    pub fn set_target(&mut self, target: ShaderTarget) {
        self.target = target;
    }

    pub fn set_polygon(&mut self, polygon: Option<PolygonMode>) {
        self.polygon = polygon;
    }

    pub fn set_alpha_test(&mut self, alpha_test: bool) {
        self.alpha_test = alpha_test;
    }

    pub fn set_depth_test(&mut self, depth_test: bool) {
        self.depth_test = depth_test;
    }

    pub fn set_ambient(&mut self, ambient: Color) {
        self.ambient = ambient;
    }

    pub fn set_light_direction(&mut self, direction: Vec3) {
        self.light_direction = direction;
    }

    pub fn set_legacy_renderer(&mut self, renderer: impl LegacyRenderer + 'static) {
        self.legacy = Some(Box::new(renderer));
    }

    /// Recompile this shader and its passes before the next use
    pub fn request_reload(&mut self) {
        self.reload = true;
        for pass in &mut self.passes {
            pass.request_reload();
        }
    }

    // ===== MULTIPASS =====

    /// Append a post-process pass drawing `fragment` over a full-screen quad
    ///
    /// The pass uses [`POSTPROCESS_VERTEX`] from `directory`, fills polygons
    /// and disables the depth test. It is compiled with the next load.
    pub fn add_pass(&mut self, directory: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> &mut Shader {
        let pass = Shader::new(directory, POSTPROCESS_VERTEX, fragment)
            .with_mask(self.mask)
            .with_polygon(Some(PolygonMode::Fill))
            .with_depth_test(false);
        self.reload = true;
        self.passes.push(pass);
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    // ===== LIFECYCLE =====

    /// Program sources resolved against the shader directory
    ///
    /// # Errors
    ///
    /// `Error::ShaderLoad` with `LOAD_ERROR` when the vertex or fragment
    /// file name is missing.
    pub fn source(&self) -> Result<ProgramSource> {
        if self.vertex.as_os_str().is_empty() || self.fragment.as_os_str().is_empty() {
            engine_bail!("glw::Shader", error = Error::ShaderLoad {
                status: ShaderStatus::LOAD_ERROR.bits(),
                files: format!("{} {}", self.vertex.display(), self.fragment.display()),
            });
        }
        Ok(ProgramSource {
            vertex: self.directory.join(&self.vertex),
            fragment: self.directory.join(&self.fragment),
            geometry: self.geometry.as_ref().map(|g| self.directory.join(g)),
        })
    }

    /// Compile and link the program and every pass, replacing any previous program
    ///
    /// On failure the shader is left unloaded, `status` carries the failure
    /// bits and the error is logged with the file names.
    pub fn load(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.release_program(device);
        self.reload = false;
        // passes follow the program; a failed program leaves none pending
        for pass in &mut self.passes {
            pass.reload = false;
        }

        if self.legacy.is_some() && self.vertex.as_os_str().is_empty() {
            self.status = ShaderStatus::OK;
            return self.load_passes(device, true);
        }

        let source = match self.source() {
            Ok(source) => source,
            Err(err) => {
                self.status = ShaderStatus::LOAD_ERROR;
                return Err(err);
            }
        };

        let program = match device.create_program(&source, &locations::BINDINGS) {
            Ok(program) => program,
            Err(Error::ShaderLoad { status, files }) => {
                self.status = ShaderStatus::from_bits_retain(status) | ShaderStatus::UNLOADED;
                engine_error!("glw::Shader", "Failed to load shader: {}", files);
                return Err(Error::ShaderLoad { status, files });
            }
            Err(err) => {
                self.status = ShaderStatus::OTHER | ShaderStatus::UNLOADED;
                engine_error!("glw::Shader", "Failed to load shader: {} ({})", source.describe(), err);
                return Err(err);
            }
        };

        self.locations.clear();
        for name in UNIFORM_NAMES {
            if let Some(location) = device.uniform_location(&program, name) {
                self.locations.insert(name, location);
            }
        }
        engine_debug!(
            "glw::Shader",
            "Loaded {} ({} uniforms, mask {:#x})",
            source.describe(),
            self.locations.len(),
            self.mask.bits()
        );
        self.program = Some(program);
        self.status = ShaderStatus::OK;

        self.load_passes(device, true)
    }

    /// Load when never loaded or when a reload was requested
    pub fn ensure_loaded(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.reload || (!self.is_loaded() && self.legacy.is_none()) {
            return self.load(device);
        }
        self.load_passes(device, false)
    }

    /// Load every pass (`all`) or only those with a pending reload
    ///
    /// A failing pass does not stop the others and stays unloaded until
    /// the next reload request. Returns the first failure.
    fn load_passes(&mut self, device: &mut dyn GraphicsDevice, all: bool) -> Result<()> {
        let mut first_error = None;
        for (index, pass) in self.passes.iter_mut().enumerate() {
            if !all && !pass.needs_reload() {
                continue;
            }
            if let Err(err) = pass.load(device) {
                engine_error!("glw::Shader", "Pass {} of {} left unloaded: {}", index, self.fragment.display(), err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn release_program(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(program) = self.program.take() {
            device.delete_program(program);
        }
        self.locations.clear();
        self.status = ShaderStatus::UNLOADED;
    }

    /// Delete the program of this shader and of every pass
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.release_program(device);
        for pass in &mut self.passes {
            pass.release(device);
        }
    }

    // ===== DRAW STATE =====

    /// Make the program current and apply the shader's fixed-function state
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` when the program is not loaded.
    pub fn use_program(&self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.program.is_none() && self.legacy.is_none() {
            engine_bail!(
                "glw::Shader",
                error = Error::InvalidResource(format!("shader {} not loaded", self.fragment.display()))
            );
        }
        device.set_depth_test(self.depth_test);
        device.set_blend(self.alpha_test);
        device.set_polygon_mode(self.polygon.unwrap_or(PolygonMode::Fill));
        device.use_program(self.program.as_ref());
        Ok(())
    }

    /// Whether the program exposes a uniform
    pub fn has_uniform(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    /// Assign one uniform if the program exposes it
    pub fn set_uniform(&self, device: &mut dyn GraphicsDevice, name: &str, value: UniformValue) -> bool {
        match self.locations.get(name) {
            Some(&location) => {
                device.set_uniform(location, value);
                true
            }
            None => false,
        }
    }

    /// Assign the per-draw uniform block of a mesh
    pub fn apply_uniforms(&self, device: &mut dyn GraphicsDevice, uniforms: &MeshUniforms) {
        for (name, value) in uniforms.values() {
            self.set_uniform(device, name, value);
        }
    }

    /// Point a sampler uniform at a texture unit
    pub fn set_sampler(&self, device: &mut dyn GraphicsDevice, name: &str, unit: u32) -> bool {
        self.set_uniform(device, name, UniformValue::Int(unit as i32))
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("vertex", &self.vertex)
            .field("fragment", &self.fragment)
            .field("mask", &self.mask)
            .field("target", &self.target)
            .field("status", &self.status)
            .field("passes", &self.passes.len())
            .field("legacy", &self.legacy.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
