/// Generational keys of the scene arenas
///
/// Each entity kind has its own key type, so a camera key can never be
/// used to look up a mesh. A key whose entity was removed is stale and
/// every lookup with it fails.

use slotmap::new_key_type;

new_key_type! {
    /// Key of a mesh in its scene
    pub struct MeshKey;
    /// Key of a camera in its scene
    pub struct CameraKey;
    /// Key of a frame in its scene
    pub struct FrameKey;
    /// Key of a render target in its scene
    pub struct RenderTargetKey;
    /// Key of an image texture in its scene
    pub struct TextureKey;
}
