//! Render loop pacing and the background render thread

mod frame_limiter;
mod render_worker;

pub use frame_limiter::FrameLimiter;
pub use render_worker::RenderWorker;
