//! Picking: resolving a window pixel to the mesh drawn there
//!
//! A picking pass renders every picking-targeted shader into an id buffer
//! parallel to the window. The buffer implementation depends on the
//! capability tier of the window:
//!
//! - Legacy: [`CpuPickingBuffer`], filled by legacy renderers
//! - Programmable: one RGBA color attachment, 24-bit id over green, red and blue
//! - Modern: two integer attachments (mesh id, vertex id)
//!
//! Window coordinates have their origin at the top-left corner.

mod cpu_buffer;
mod picking_buffer;

pub use cpu_buffer::CpuPickingBuffer;
pub use picking_buffer::{
    id_from_bgra, normalize_box, rgba_from_id, IntegerTargets, PickResult, PickingBuffer, RgbaTargets, RGBA_ID_MASK,
};
