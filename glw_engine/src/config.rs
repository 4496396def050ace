//! Engine and window configuration

use std::path::PathBuf;
use crate::texture::Color;

/// Number of entries in a window's shader table
pub const SHADER_TABLE_SIZE: usize = 24;

/// Slots below this index are reserved for the default shader set
pub const DEFAULT_SHADER_SLOTS: usize = 12;

/// Engine-wide limits and defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of simultaneously open windows
    pub max_windows: usize,
    /// Maximum number of meshes per window (picking ids are `1..max_meshes`)
    pub max_meshes: usize,
    /// Maximum number of cameras per window
    pub max_cameras: usize,
    /// Target frame rate used by `Engine::render_end`
    pub frame_rate: u32,
    /// Directory the default shader set is loaded from
    pub shaders_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_windows: 8,
            max_meshes: 1024,
            max_cameras: 1024,
            frame_rate: 24,
            shaders_path: PathBuf::from("shader"),
        }
    }
}

impl EngineConfig {
    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.max_windows = max_windows;
        self
    }

    pub fn with_max_meshes(mut self, max_meshes: usize) -> Self {
        self.max_meshes = max_meshes;
        self
    }

    pub fn with_max_cameras(mut self, max_cameras: usize) -> Self {
        self.max_cameras = max_cameras;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_shaders_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shaders_path = path.into();
        self
    }
}

/// Per-window settings
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background: Color,
    /// Load the default shader set at the first render cycle
    pub load_default_shaders: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "glw".to_string(),
            width: 800,
            height: 600,
            background: Color::BLUE,
            load_default_shaders: true,
        }
    }
}

impl WindowConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_default_shaders(mut self, load: bool) -> Self {
        self.load_default_shaders = load;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
