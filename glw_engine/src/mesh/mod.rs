//! Meshes and their transform hierarchy

mod mesh;

pub use mesh::{
    depth_range_for, polygon_for_primitive, BoundTexture, DrawContext, Mesh, TextureBinding,
};
