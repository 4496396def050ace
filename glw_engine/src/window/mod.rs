//! Window contexts, input translation and event handlers

mod context;
mod event;
mod input;

pub use context::{PickHit, WindowContext, WindowState};
pub use event::{
    CameraEventHandler, EventContext, HandlerId, InputEvent, Key, KeyAction, MeshEvent, MeshEventHandler,
    MouseButtons, PickingAccess, PointerState,
};
pub use input::{action_from_state, button_from_winit, key_from_winit, InputTranslator, PIXELS_PER_LINE};
