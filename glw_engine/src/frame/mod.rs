//! Frames: window and render-target sub-regions

mod frame;

pub use frame::{sort_by_preference, Frame, FrameUnits, FramebufferTarget, Viewport};
