/*!
# GLW Engine

Retained-mode 3D renderer for scientific and CAD visualisation.

An application builds a scene of meshes, cameras and frames inside a
window context; the engine renders it every cycle through a
[`GraphicsDevice`](glw::device::GraphicsDevice) chosen per window
according to its capability tier.

## Architecture

- **Engine**: registry of window contexts, render loop and global logger
- **WindowContext**: scene, shader slot table, picking and input dispatch of one window
- **Scene**: generational arenas of meshes, cameras, frames, render targets and textures
- **Mesh**: typed GPU streams, transform hierarchy and event handlers
- **Camera / Frame**: view recipes drawn into window or render-target sub-regions
- **ShaderTable**: shader programs addressed by bitmask slots, with multipass chains
- **PickingBuffer**: resolves a window pixel to the mesh and vertex drawn there
- **RenderWorker**: background thread driving the render loop

Everything user-facing lives under the [`glw`] namespace.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod device;
pub mod stream;
pub mod texture;
pub mod mesh;
pub mod camera;
pub mod frame;
pub mod target;
pub mod shader;
pub mod picking;
pub mod scene;
pub mod window;
pub mod worker;
pub mod shapes;
mod utils;

// Main glw namespace module
pub mod glw {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine and configuration
    pub use crate::engine::{Engine, RenderCallback, WindowId};
    pub use crate::config::{EngineConfig, WindowConfig, DEFAULT_SHADER_SLOTS, SHADER_TABLE_SIZE};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger, MemoryLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    pub mod device {
        pub use crate::device::*;
    }

    pub mod stream {
        pub use crate::stream::*;
    }

    pub mod texture {
        pub use crate::texture::*;
    }

    pub mod mesh {
        pub use crate::mesh::*;
    }

    pub mod camera {
        pub use crate::camera::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod target {
        pub use crate::target::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod picking {
        pub use crate::picking::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod window {
        pub use crate::window::*;
    }

    pub mod worker {
        pub use crate::worker::*;
    }

    pub use crate::shapes;
}

// Re-export math library at crate root
pub use glam;
