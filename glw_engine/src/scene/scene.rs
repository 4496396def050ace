/// Scene - the entities of one window and their relations.
///
/// Every entity lives in a SlotMap for O(1) insert/remove with stable,
/// generation-checked keys. Membership lists never own their members:
/// removing an entity drops it from every list that referenced it.

use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use crate::camera::{Camera, ViewRecipe};
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::frame::{sort_by_preference, Frame};
use crate::mesh::{Mesh, TextureBinding};
use crate::target::RenderTarget;
use crate::texture::Texture;
use crate::utils::SlotAllocator;
use crate::{engine_bail, engine_debug, engine_err, engine_warn};
use super::keys::{CameraKey, FrameKey, MeshKey, RenderTargetKey, TextureKey};
use super::relation::RelationTable;

/// Entities of one window
///
/// The scene holds no graphics device. Operations that release GPU
/// objects take the window's device as a parameter.
pub struct Scene {
    pub(crate) meshes: SlotMap<MeshKey, Mesh>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) frames: SlotMap<FrameKey, Frame>,
    pub(crate) targets: SlotMap<RenderTargetKey, RenderTarget>,
    pub(crate) textures: SlotMap<TextureKey, Texture>,
    /// Camera -> meshes it draws
    pub(crate) camera_meshes: RelationTable<CameraKey, MeshKey>,
    /// Frame -> cameras it renders
    pub(crate) frame_cameras: RelationTable<FrameKey, CameraKey>,
    /// Render target -> frames drawn into it
    pub(crate) target_frames: RelationTable<RenderTargetKey, FrameKey>,
    /// Frames drawn into the window
    pub(crate) screen_frames: Vec<FrameKey>,
    /// Cameras receiving window input
    pub(crate) attached: Vec<CameraKey>,
    picking_ids: SlotAllocator,
    picking_index: FxHashMap<u32, MeshKey>,
    max_cameras: usize,
    screen: (u32, u32),
}

impl Scene {
    /// Empty scene; picking ids are drawn from `1..max_meshes`
    pub fn new(max_meshes: usize, max_cameras: usize) -> Self {
        Self {
            meshes: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
            frames: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            camera_meshes: RelationTable::new(),
            frame_cameras: RelationTable::new(),
            target_frames: RelationTable::new(),
            screen_frames: Vec::new(),
            attached: Vec::new(),
            picking_ids: SlotAllocator::new(1, max_meshes as u32),
            picking_index: FxHashMap::default(),
            max_cameras,
            screen: (1, 1),
        }
    }

    /// Window size used for blit offsets
    pub fn screen(&self) -> (u32, u32) {
        self.screen
    }

    pub(crate) fn set_screen(&mut self, width: u32, height: u32) {
        self.screen = (width.max(1), height.max(1));
    }

    // ===== MESHES =====

    /// Add a mesh and give it a free picking id
    ///
    /// # Errors
    ///
    /// `Error::CapacityExceeded` when every picking id is in use.
    pub fn add_mesh(&mut self, mut mesh: Mesh) -> Result<MeshKey> {
        let Some(id) = self.picking_ids.alloc() else {
            engine_bail!(
                "glw::Scene",
                error = Error::CapacityExceeded(format!(
                    "Too many meshes ({} picking ids)",
                    self.picking_ids.capacity()
                ))
            );
        };
        mesh.set_picking_id(id);
        let key = self.meshes.insert(mesh);
        self.picking_index.insert(id, key);
        Ok(key)
    }

    pub fn mesh(&self, key: MeshKey) -> Result<&Mesh> {
        self.meshes.get(key).ok_or_else(|| stale("mesh", key))
    }

    pub fn mesh_mut(&mut self, key: MeshKey) -> Result<&mut Mesh> {
        self.meshes.get_mut(key).ok_or_else(|| stale("mesh", key))
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshKey, &Mesh)> {
        self.meshes.iter()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Mesh currently holding a picking id
    pub fn mesh_by_picking_id(&self, id: u32) -> Option<MeshKey> {
        self.picking_index.get(&id).copied().filter(|key| self.meshes.contains_key(*key))
    }

    /// Remove a mesh, notify its dispose handlers and release its GPU objects
    ///
    /// The mesh is dropped from every camera. Children keep their parent
    /// key, which no longer resolves, so they become roots.
    pub fn remove_mesh(&mut self, device: &mut dyn GraphicsDevice, key: MeshKey) -> Result<Mesh> {
        let Some(mut mesh) = self.meshes.remove(key) else {
            return Err(stale("mesh", key));
        };
        let mut handlers = mesh.take_handlers();
        for (_, handler) in handlers.iter_mut() {
            handler.on_dispose(key, &mesh);
        }
        mesh.restore_handlers(handlers);

        mesh.release(device);
        self.picking_ids.free(mesh.picking_id());
        self.picking_index.remove(&mesh.picking_id());
        self.camera_meshes.remove_member(key);
        engine_debug!("glw::Scene", "Mesh '{}' removed", mesh.label());
        Ok(mesh)
    }

    /// World matrix: parent chain composed root to leaf
    ///
    /// A parent key that no longer resolves ends the chain. A cycle is
    /// reported and broken after visiting every mesh once.
    pub fn world_matrix(&self, key: MeshKey) -> Result<Mat4> {
        let mut mesh = self.mesh(key)?;
        let mut world = mesh.transformation_matrix(self.screen);
        let mut steps = 0;
        while let Some(parent) = mesh.parent().and_then(|p| self.meshes.get(p)) {
            steps += 1;
            if steps > self.meshes.len() {
                engine_warn!("glw::Scene", "Parent cycle detected from mesh '{}'", self.mesh(key)?.label());
                break;
            }
            world = parent.transformation_matrix(self.screen) * world;
            mesh = parent;
        }
        Ok(world)
    }

    // ===== CAMERAS =====

    /// Add a camera
    ///
    /// # Errors
    ///
    /// `Error::CapacityExceeded` beyond the configured camera count.
    pub fn add_camera(&mut self, camera: Camera) -> Result<CameraKey> {
        if self.cameras.len() >= self.max_cameras {
            engine_bail!(
                "glw::Scene",
                error = Error::CapacityExceeded(format!("Too many cameras ({})", self.max_cameras))
            );
        }
        Ok(self.cameras.insert(camera))
    }

    pub fn camera(&self, key: CameraKey) -> Result<&Camera> {
        self.cameras.get(key).ok_or_else(|| stale("camera", key))
    }

    pub fn camera_mut(&mut self, key: CameraKey) -> Result<&mut Camera> {
        self.cameras.get_mut(key).ok_or_else(|| stale("camera", key))
    }

    pub fn cameras(&self) -> impl Iterator<Item = (CameraKey, &Camera)> {
        self.cameras.iter()
    }

    /// Remove a camera from the scene, its frames and the input list
    pub fn remove_camera(&mut self, key: CameraKey) -> Result<Camera> {
        let camera = self.cameras.remove(key).ok_or_else(|| stale("camera", key))?;
        self.camera_meshes.remove_owner(key);
        self.frame_cameras.remove_member(key);
        self.attached.retain(|c| *c != key);
        Ok(camera)
    }

    /// Append a mesh to the draw list of a camera (duplicates allowed)
    pub fn camera_add_mesh(&mut self, camera: CameraKey, mesh: MeshKey) -> Result<()> {
        self.camera(camera)?;
        self.mesh(mesh)?;
        self.camera_meshes.add(camera, mesh);
        Ok(())
    }

    pub fn camera_remove_mesh(&mut self, camera: CameraKey, mesh: MeshKey) -> bool {
        self.camera_meshes.remove(camera, mesh)
    }

    /// Meshes drawn by a camera, in insertion order
    pub fn camera_meshes(&self, camera: CameraKey) -> &[MeshKey] {
        self.camera_meshes.members(camera)
    }

    /// Let a camera receive window input
    pub fn attach_camera(&mut self, camera: CameraKey) -> Result<()> {
        self.camera(camera)?;
        if !self.attached.contains(&camera) {
            self.attached.push(camera);
        }
        Ok(())
    }

    pub fn detach_camera(&mut self, camera: CameraKey) -> bool {
        let before = self.attached.len();
        self.attached.retain(|c| *c != camera);
        self.attached.len() != before
    }

    pub fn attached_cameras(&self) -> &[CameraKey] {
        &self.attached
    }

    /// Fit a CAD camera onto the world bounds of its meshes
    ///
    /// Returns false (and changes nothing) for other recipes or when the
    /// meshes have no vertices.
    pub fn autofit(&mut self, key: CameraKey) -> Result<bool> {
        if self.camera(key)?.recipe() != ViewRecipe::Cad {
            return Ok(false);
        }
        let mut seen = FxHashSet::default();
        let mut bounds: Option<(Vec3, Vec3)> = None;
        for &mesh_key in self.camera_meshes.members(key) {
            if !seen.insert(mesh_key) {
                continue;
            }
            let Ok(mesh) = self.mesh(mesh_key) else { continue };
            let Some((min, max)) = mesh.bounds(self.world_matrix(mesh_key)?) else { continue };
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(min), hi.max(max)),
                None => (min, max),
            });
        }
        let Some((min, max)) = bounds else {
            return Ok(false);
        };
        self.camera_mut(key)?.fit_box(min, max);
        Ok(true)
    }

    // ===== FRAMES =====

    pub fn add_frame(&mut self, frame: Frame) -> FrameKey {
        self.frames.insert(frame)
    }

    pub fn frame(&self, key: FrameKey) -> Result<&Frame> {
        self.frames.get(key).ok_or_else(|| stale("frame", key))
    }

    pub fn frame_mut(&mut self, key: FrameKey) -> Result<&mut Frame> {
        self.frames.get_mut(key).ok_or_else(|| stale("frame", key))
    }

    pub fn remove_frame(&mut self, key: FrameKey) -> Result<Frame> {
        let frame = self.frames.remove(key).ok_or_else(|| stale("frame", key))?;
        self.frame_cameras.remove_owner(key);
        self.target_frames.remove_member(key);
        self.screen_frames.retain(|f| *f != key);
        Ok(frame)
    }

    /// Append a camera to a frame (duplicates allowed)
    pub fn frame_add_camera(&mut self, frame: FrameKey, camera: CameraKey) -> Result<()> {
        self.frame(frame)?;
        self.camera(camera)?;
        self.frame_cameras.add(frame, camera);
        Ok(())
    }

    pub fn frame_remove_camera(&mut self, frame: FrameKey, camera: CameraKey) -> bool {
        self.frame_cameras.remove(frame, camera)
    }

    pub fn frame_cameras(&self, frame: FrameKey) -> &[CameraKey] {
        self.frame_cameras.members(frame)
    }

    /// Draw a frame into the window
    pub fn add_screen_frame(&mut self, frame: FrameKey) -> Result<()> {
        self.frame(frame)?;
        self.screen_frames.push(frame);
        Ok(())
    }

    /// Frames drawn into the window, in render order after the last sort
    pub fn screen_frames(&self) -> &[FrameKey] {
        &self.screen_frames
    }

    /// Stable-sort the window frames and every target's frames by preference
    pub fn sort_frames(&mut self) {
        let frames = &self.frames;
        let preference = |key: &FrameKey| frames.get(*key).map(Frame::preference).unwrap_or(0);
        sort_by_preference(&mut self.screen_frames, preference);
        let targets: Vec<RenderTargetKey> = self.targets.keys().collect();
        for target in targets {
            sort_by_preference(self.target_frames.members_mut(target), preference);
        }
    }

    // ===== RENDER TARGETS =====

    pub fn add_render_target(&mut self, target: RenderTarget) -> RenderTargetKey {
        self.targets.insert(target)
    }

    pub fn render_target(&self, key: RenderTargetKey) -> Result<&RenderTarget> {
        self.targets.get(key).ok_or_else(|| stale("render target", key))
    }

    pub fn render_target_mut(&mut self, key: RenderTargetKey) -> Result<&mut RenderTarget> {
        self.targets.get_mut(key).ok_or_else(|| stale("render target", key))
    }

    pub fn render_targets(&self) -> impl Iterator<Item = (RenderTargetKey, &RenderTarget)> {
        self.targets.iter()
    }

    /// Remove a render target and release its buffer
    ///
    /// Meshes sampling it keep the binding, which then draws untextured.
    pub fn remove_render_target(&mut self, device: &mut dyn GraphicsDevice, key: RenderTargetKey) -> Result<()> {
        let mut target = self.targets.remove(key).ok_or_else(|| stale("render target", key))?;
        target.release(device);
        self.target_frames.remove_owner(key);
        Ok(())
    }

    /// Draw a frame into a render target
    pub fn target_add_frame(&mut self, target: RenderTargetKey, frame: FrameKey) -> Result<()> {
        self.render_target(target)?;
        self.frame(frame)?;
        self.target_frames.add(target, frame);
        Ok(())
    }

    pub fn target_remove_frame(&mut self, target: RenderTargetKey, frame: FrameKey) -> bool {
        self.target_frames.remove(target, frame)
    }

    pub fn target_frames(&self, target: RenderTargetKey) -> &[FrameKey] {
        self.target_frames.members(target)
    }

    // ===== TEXTURES =====

    pub fn add_texture(&mut self, texture: Texture) -> TextureKey {
        self.textures.insert(texture)
    }

    pub fn texture(&self, key: TextureKey) -> Result<&Texture> {
        self.textures.get(key).ok_or_else(|| stale("texture", key))
    }

    pub fn texture_mut(&mut self, key: TextureKey) -> Result<&mut Texture> {
        self.textures.get_mut(key).ok_or_else(|| stale("texture", key))
    }

    /// Remove a texture and release its GPU copy
    ///
    /// Meshes still bound to it are unbound.
    pub fn remove_texture(&mut self, device: &mut dyn GraphicsDevice, key: TextureKey) -> Result<Texture> {
        let mut texture = self.textures.remove(key).ok_or_else(|| stale("texture", key))?;
        texture.release(device);
        for (_, mesh) in self.meshes.iter_mut() {
            if mesh.texture() == Some(TextureBinding::Image(key)) {
                mesh.set_texture(None);
            }
        }
        Ok(texture)
    }

    // ===== TEARDOWN =====

    /// Release the GPU objects of every mesh, texture and render target
    ///
    /// Entities stay in the scene and recreate their objects on the next
    /// draw.
    pub fn release_all(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, mesh) in self.meshes.iter_mut() {
            mesh.release(device);
        }
        for (_, texture) in self.textures.iter_mut() {
            texture.release(device);
        }
        for (_, target) in self.targets.iter_mut() {
            target.release(device);
        }
    }

    /// Whether any entity still holds a GPU object
    pub fn has_gpu_objects(&self) -> bool {
        self.meshes.values().any(Mesh::has_gpu_objects)
            || self.textures.values().any(|t| t.handle().is_some())
            || self.targets.values().any(|t| t.buffer().is_generated())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("meshes", &self.meshes.len())
            .field("cameras", &self.cameras.len())
            .field("frames", &self.frames.len())
            .field("targets", &self.targets.len())
            .field("textures", &self.textures.len())
            .finish()
    }
}

fn stale(kind: &str, key: impl std::fmt::Debug) -> Error {
    engine_err!("glw::Scene", error = Error::InvalidResource(format!("{} {:?} does not exist", kind, key)))
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
