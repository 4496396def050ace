/// Shader capability masks and their slot mapping
///
/// Every bit of a mask names one entry of the window's shader table: bit
/// `i` is slot `i`. Meshes carry a union of masks (the shaders allowed to
/// draw them); a shader carries exactly one bit.

use bitflags::bitflags;
use crate::config::SHADER_TABLE_SIZE;

bitflags! {
    /// Set of shader slots
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderMask: u32 {
        const SOLID = 1;
        const WIREFRAME = 2;
        const DOTCLOUD = 4;
        const BLIT = 8;
        const TEXTURE = 16;
        const FONT = 32;
        const PICKING = 64;
        const ISOLINES = 128;
        const VECTOR = 256;

        // user slots
        const _ = !0;
    }
}

impl ShaderMask {
    /// Slot of the lowest set bit, `None` for an empty mask or a bit past the table
    pub fn slot(self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let slot = self.bits().trailing_zeros() as usize;
        (slot < SHADER_TABLE_SIZE).then_some(slot)
    }

    /// Single-bit mask of a table slot
    pub fn from_slot(slot: usize) -> Option<Self> {
        (slot < SHADER_TABLE_SIZE).then(|| Self::from_bits_retain(1 << slot))
    }

    /// Whether the mask names exactly one slot
    pub fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
