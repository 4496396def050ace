/// Application-supplied draw path for the Legacy capability tier

use glam::Mat4;
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::picking::CpuPickingBuffer;

/// Everything a legacy callback needs to draw one mesh
pub struct LegacyDraw<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub mesh: &'a Mesh,
    pub model: Mat4,
    pub view: Mat4,
    /// Screen size in pixels
    pub screen: (u32, u32),
    /// CPU id buffer, present while drawing the picking slot
    pub picking: Option<&'a mut CpuPickingBuffer>,
}

/// Fixed-function draw callback
///
/// Used instead of a shader program when the device only offers the
/// Legacy tier. A callback drawing the picking slot is expected to write
/// the mesh's picking id into `LegacyDraw::picking`.
pub trait LegacyRenderer: Send {
    fn draw(&self, draw: &mut LegacyDraw<'_>) -> Result<()>;
}

impl<F> LegacyRenderer for F
where
    F: Fn(&mut LegacyDraw<'_>) -> Result<()> + Send,
{
    fn draw(&self, draw: &mut LegacyDraw<'_>) -> Result<()> {
        self(draw)
    }
}
