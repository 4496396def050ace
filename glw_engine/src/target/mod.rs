//! Off-screen render buffers and render targets

mod render_buffer;
mod render_target;

pub use render_buffer::RenderBuffer;
pub use render_target::RenderTarget;
