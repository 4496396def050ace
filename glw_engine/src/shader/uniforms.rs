/// Uniform vocabulary shared by every shader program

use glam::{Mat4, Vec2, Vec3, Vec4};
use crate::device::UniformValue;

pub const TEXTURE0: &str = "Texture0";
pub const TEXTURE1: &str = "Texture1";
pub const DEPTH_BUFFER: &str = "DepthBuffer";

/// Every uniform name a program may expose, in a stable order
pub const UNIFORM_NAMES: [&str; 16] = [
    TEXTURE0,
    TEXTURE1,
    DEPTH_BUFFER,
    "ScreenSize",
    "ModelViewProjMatrix",
    "ViewMatrix",
    "ModelMatrix",
    "PrimaryColor",
    "SecondaryColor",
    "AmbientLight",
    "LightDirection",
    "TextureBlend",
    "Culling",
    "PickingId",
    "ScalarRange",
    "SelfIlumination",
];

/// Per-draw uniform values of one mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshUniforms {
    pub model_view_proj: Mat4,
    pub view: Mat4,
    pub model: Mat4,
    /// Normalized RGBA
    pub primary_color: Vec4,
    pub secondary_color: Vec4,
    pub ambient_light: Vec4,
    pub light_direction: Vec3,
    pub screen_size: Vec2,
    pub culling: i32,
    pub picking_id: i32,
    pub scalar_range: Vec2,
    pub self_illumination: f32,
    pub texture_blend: f32,
}

impl Default for MeshUniforms {
    fn default() -> Self {
        Self {
            model_view_proj: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            primary_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            secondary_color: Vec4::new(1.0, 1.0, 1.0, 0.0),
            ambient_light: Vec4::ONE,
            light_direction: Vec3::new(1.0, 1.0, -1.0),
            screen_size: Vec2::ONE,
            culling: 0,
            picking_id: 0,
            scalar_range: Vec2::new(0.0, 1.0),
            self_illumination: 0.0,
            texture_blend: 1.0,
        }
    }
}

impl MeshUniforms {
    /// Name/value pairs, samplers excluded
    pub fn values(&self) -> [(&'static str, UniformValue); 13] {
        [
            ("ModelViewProjMatrix", UniformValue::Mat4(self.model_view_proj)),
            ("ViewMatrix", UniformValue::Mat4(self.view)),
            ("ModelMatrix", UniformValue::Mat4(self.model)),
            ("PrimaryColor", UniformValue::Vec4(self.primary_color)),
            ("SecondaryColor", UniformValue::Vec4(self.secondary_color)),
            ("AmbientLight", UniformValue::Vec4(self.ambient_light)),
            ("LightDirection", UniformValue::Vec3(self.light_direction)),
            ("ScreenSize", UniformValue::Vec2(self.screen_size)),
            ("Culling", UniformValue::Int(self.culling)),
            ("PickingId", UniformValue::Int(self.picking_id)),
            ("ScalarRange", UniformValue::Vec2(self.scalar_range)),
            ("SelfIlumination", UniformValue::Float(self.self_illumination)),
            ("TextureBlend", UniformValue::Float(self.texture_blend)),
        ]
    }
}
