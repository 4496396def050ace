//! Graphics device abstraction
//!
//! The engine core never calls a graphics API directly. It drives a
//! [`GraphicsDevice`], owned by each window context, and stores the
//! move-only handles the device returns. [`HeadlessDevice`] is the CPU
//! implementation shipped with the crate.

mod types;
mod graphics_device;
mod headless_device;
mod raster;

pub use types::*;
pub use graphics_device::GraphicsDevice;
pub use headless_device::{HeadlessDevice, HEADLESS_UNIFORMS};
