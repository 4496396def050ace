/// CPU-resident id buffer of the Legacy tier

use crate::error::{Error, Result};
use crate::engine_err;

/// `width * height * 4` bytes, rows bottom-up, one little-endian `u32` id per pixel
#[derive(Debug, Clone, Default)]
pub struct CpuPickingBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CpuPickingBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0; width as usize * height as usize * 4] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocate for a new size; returns false when the size is unchanged
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) && !self.pixels.is_empty() {
            return false;
        }
        *self = Self::new(width, height);
        true
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn offset(&self, x: i32, y: i32) -> Result<usize> {
        let pixels = self.width as usize * self.height as usize;
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            let index = if x < 0 || y < 0 { usize::MAX } else { y as usize * self.width as usize + x as usize };
            return Err(engine_err!("glw::Picking", error = Error::IndexError { index, length: pixels }));
        }
        let row = (self.height as i32 - y - 1) as usize;
        Ok(4 * (row * self.width as usize + x as usize))
    }

    /// Tag window pixel `(x, y)` with `id`
    pub fn write_id(&mut self, x: i32, y: i32, id: u32) -> Result<()> {
        let offset = self.offset(x, y)?;
        self.pixels[offset..offset + 4].copy_from_slice(&id.to_le_bytes());
        Ok(())
    }

    /// Id stored at window pixel `(x, y)`, 0 when untouched
    pub fn read_id(&self, x: i32, y: i32) -> Result<u32> {
        let offset = self.offset(x, y)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.pixels[offset..offset + 4]);
        Ok(u32::from_le_bytes(bytes))
    }
}
