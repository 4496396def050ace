/// CPU image mirrored into a GPU texture.
///
/// Pixels are stored as BGRA8 rows, bottom row first. The GPU texture is
/// created at the first draw that samples it and re-uploaded whenever the
/// image is marked dirty.

use crate::device::{GraphicsDevice, TextureDesc, TextureFilter, TextureFormat, TextureId};
use crate::error::{Error, Result};
use crate::{engine_bail, engine_debug};
use super::color::Color;

/// BGRA8 image with lazy GPU upload
#[derive(Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    filter: TextureFilter,
    mipmaps: bool,
    dirty: bool,
    stale: bool,
    handle: Option<TextureId>,
}

impl Texture {
    /// Texture from BGRA8 pixels (`width * height * 4` bytes)
    pub fn from_bgra(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            engine_bail!("glw::Texture", error = Error::InvalidResource(format!(
                "{}x{} texture needs {} bytes, got {}", width, height, expected, pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            filter: TextureFilter::Linear,
            mipmaps: false,
            dirty: true,
            stale: false,
            handle: None,
        })
    }

    /// Texture filled with one color
    pub fn solid(width: u32, height: u32, color: Color) -> Result<Self> {
        let count = width as usize * height as usize;
        Self::from_bgra(width, height, color.to_bgra().repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGRA8 pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        Some(Color::from_bgra([self.pixels[at], self.pixels[at + 1], self.pixels[at + 2], self.pixels[at + 3]]))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) -> Result<()> {
        if x >= self.width || y >= self.height {
            engine_bail!("glw::Texture", error = Error::IndexError {
                index: (y * self.width + x) as usize,
                length: (self.width * self.height) as usize,
            });
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[at..at + 4].copy_from_slice(&color.to_bgra());
        self.dirty = true;
        Ok(())
    }

    /// Sampling filter and mipmap generation used at the next upload
    pub fn set_sampling(&mut self, filter: TextureFilter, mipmaps: bool) {
        self.filter = filter;
        self.mipmaps = mipmaps;
        self.release_on_next_sync();
    }

    /// Make every pixel within `tolerance` of `mask` (per RGB channel) fully transparent
    pub fn set_transparency_mask(&mut self, mask: Color, tolerance: u8) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            let close = pixel[0].abs_diff(mask.b) <= tolerance
                && pixel[1].abs_diff(mask.g) <= tolerance
                && pixel[2].abs_diff(mask.r) <= tolerance;
            if close {
                pixel[3] = 0;
            }
        }
        self.dirty = true;
    }

    /// Crop or extend the image to `width` x `height` starting at `(x0, y0)`
    ///
    /// Pixels outside the original image become transparent black. The GPU
    /// texture is recreated at the next upload.
    pub fn canvas(&mut self, x0: i32, y0: i32, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_bail!("glw::Texture", error = Error::InvalidResource(format!("canvas {}x{}", width, height)));
        }
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let (sx, sy) = (x0 + x, y0 + y);
                if sx < 0 || sy < 0 || sx >= self.width as i32 || sy >= self.height as i32 {
                    continue;
                }
                let from = (sy as usize * self.width as usize + sx as usize) * 4;
                let to = (y as usize * width as usize + x as usize) * 4;
                pixels[to..to + 4].copy_from_slice(&self.pixels[from..from + 4]);
            }
        }
        self.pixels = pixels;
        self.width = width;
        self.height = height;
        self.release_on_next_sync();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// GPU texture of the last upload
    pub fn handle(&self) -> Option<&TextureId> {
        self.handle.as_ref()
    }

    /// Create or refresh the GPU texture when needed
    pub fn sync(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.stale {
            self.release(device);
            self.stale = false;
        }
        if self.handle.is_some() && !self.dirty {
            return Ok(());
        }
        let rgba: Vec<u8> = self
            .pixels
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect();

        match &self.handle {
            Some(handle) => device.update_texture(handle, &rgba)?,
            None => {
                let mipmaps = self.mipmaps && self.width.is_power_of_two() && self.height.is_power_of_two();
                let desc = TextureDesc::new(self.width, self.height, TextureFormat::Rgba8)
                    .with_filter(self.filter)
                    .with_mipmaps(mipmaps);
                self.handle = Some(device.create_texture(&desc, Some(&rgba))?);
                engine_debug!("glw::Texture", "Uploaded {}x{} texture", self.width, self.height);
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Release the GPU texture
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(handle) = self.handle.take() {
            device.delete_texture(handle);
        }
    }

    fn release_on_next_sync(&mut self) {
        self.dirty = true;
        self.stale = true;
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
