//! Images sampled by meshes

mod color;
mod texture;

pub use color::Color;
pub use texture::Texture;
