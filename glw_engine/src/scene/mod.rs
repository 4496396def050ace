//! Scene registry of a window
//!
//! Meshes, cameras, frames, render targets and textures live in
//! generational arenas owned by the window's [`Scene`]. Membership
//! (camera -> meshes, frame -> cameras, target -> frames) is kept in
//! relation tables separate from ownership.

mod keys;
mod relation;
mod scene;

pub use keys::{CameraKey, FrameKey, MeshKey, RenderTargetKey, TextureKey};
pub use relation::RelationTable;
pub use scene::Scene;
