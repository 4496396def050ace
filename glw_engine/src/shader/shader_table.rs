/// Fixed-size table of shader slots owned by a window context

use crate::config::{DEFAULT_SHADER_SLOTS, SHADER_TABLE_SIZE};
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::engine_bail;
use super::mask::ShaderMask;
use super::shader::Shader;

/// Shader slots indexed by mask bit
#[derive(Debug)]
pub struct ShaderTable {
    slots: Vec<Option<Shader>>,
}

impl ShaderTable {
    pub fn new() -> Self {
        Self { slots: (0..SHADER_TABLE_SIZE).map(|_| None).collect() }
    }

    /// First free user slot (at or above the reserved default slots)
    pub fn request_slot(&self) -> Option<ShaderMask> {
        (DEFAULT_SHADER_SLOTS..SHADER_TABLE_SIZE)
            .find(|&slot| self.slots[slot].is_none())
            .and_then(ShaderMask::from_slot)
    }

    /// Store a shader in the slot named by its mask
    ///
    /// Returns the shader previously held by the slot; the caller releases it.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` when the shader mask is not a single bit
    /// inside the table.
    pub fn install(&mut self, shader: Shader) -> Result<Option<Shader>> {
        let mask = shader.mask();
        let Some(slot) = mask.slot().filter(|_| mask.is_single()) else {
            engine_bail!(
                "glw::ShaderTable",
                error = Error::InvalidResource(format!("shader mask {:#x} does not name a slot", mask.bits()))
            );
        };
        Ok(self.slots[slot].replace(shader))
    }

    /// Store a shader in the first free user slot and return its mask
    ///
    /// # Errors
    ///
    /// `Error::CapacityExceeded` when every user slot is taken.
    pub fn insert_user(&mut self, mut shader: Shader) -> Result<ShaderMask> {
        let Some(mask) = self.request_slot() else {
            engine_bail!("glw::ShaderTable", error = Error::CapacityExceeded("Too many shaders".to_string()));
        };
        shader.set_mask(mask);
        self.install(shader)?;
        Ok(mask)
    }

    /// Take a shader out of its slot
    pub fn remove(&mut self, mask: ShaderMask) -> Option<Shader> {
        self.slots.get_mut(mask.slot()?)?.take()
    }

    pub fn get(&self, mask: ShaderMask) -> Option<&Shader> {
        self.slots.get(mask.slot()?)?.as_ref()
    }

    pub fn get_mut(&mut self, mask: ShaderMask) -> Option<&mut Shader> {
        self.slots.get_mut(mask.slot()?)?.as_mut()
    }

    pub fn slot(&self, slot: usize) -> Option<&Shader> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut Shader> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Occupied slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Shader)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| s.as_ref().map(|s| (slot, s)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Shader)> {
        self.slots.iter_mut().enumerate().filter_map(|(slot, s)| s.as_mut().map(|s| (slot, s)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every shader whose reload flag is set; failures are logged
    pub fn load_pending(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let mut loaded = 0;
        for (_, shader) in self.iter_mut() {
            if shader.needs_reload() && shader.ensure_loaded(device).is_ok() {
                loaded += 1;
            }
        }
        loaded
    }

    /// Release every program and empty the table
    pub fn release_all(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in &mut self.slots {
            if let Some(mut shader) = slot.take() {
                shader.release(device);
            }
        }
    }
}

impl Default for ShaderTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "shader_table_tests.rs"]
mod tests;
