//! Shader programs, the per-window slot table and multipass chains

mod mask;
mod uniforms;
mod shader;
mod shader_table;
mod defaults;
mod legacy;

pub use mask::ShaderMask;
pub use uniforms::{MeshUniforms, UNIFORM_NAMES, TEXTURE0, TEXTURE1, DEPTH_BUFFER};
pub use shader::{Shader, ShaderStatus, ShaderTarget, POSTPROCESS_VERTEX};
pub use shader_table::ShaderTable;
pub use defaults::{default_shaders, ISOLINES_PASS};
pub use legacy::{LegacyDraw, LegacyRenderer};
