/// 8-bit RGBA color

use glam::Vec4;

/// 8-bit per channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::hex(0xFFFFFF);
    pub const SILVER: Color = Color::hex(0xC0C0C0);
    pub const GRAY: Color = Color::hex(0x808080);
    pub const BLACK: Color = Color::hex(0x000000);
    pub const RED: Color = Color::hex(0xFF0000);
    pub const MAROON: Color = Color::hex(0x800000);
    pub const YELLOW: Color = Color::hex(0xFFFF00);
    pub const OLIVE: Color = Color::hex(0x808000);
    pub const LIME: Color = Color::hex(0x00FF00);
    pub const GREEN: Color = Color::hex(0x008000);
    pub const CYAN: Color = Color::hex(0x00FFFF);
    pub const TEAL: Color = Color::hex(0x008080);
    pub const BLUE: Color = Color::hex(0x0000FF);
    pub const NAVY: Color = Color::hex(0x000080);
    pub const MAGENTA: Color = Color::hex(0xFF00FF);
    pub const PURPLE: Color = Color::hex(0x800080);
    pub const ORANGE: Color = Color::hex(0xFF8C00);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from `0xRRGGBB`
    pub const fn hex(rgb: u32) -> Self {
        Self::rgba((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 0xFF)
    }

    /// Same color with another alpha
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Normalized RGBA
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r as f32, self.g as f32, self.b as f32, self.a as f32) / 255.0
    }

    /// Pixel bytes in BGRA order
    pub fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }

    pub fn from_bgra(bytes: [u8; 4]) -> Self {
        Self::rgba(bytes[2], bytes[1], bytes[0], bytes[3])
    }
}
