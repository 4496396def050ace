/// Input vocabulary and typed event handlers

use std::sync::atomic::{AtomicU64, Ordering};
use bitflags::bitflags;
use crate::device::GraphicsDevice;
use crate::frame::Viewport;
use crate::mesh::Mesh;
use crate::picking::{PickResult, PickingBuffer};
use crate::scene::{CameraKey, MeshKey, Scene};
use crate::camera::Camera;

// ============================================================================
// Vocabulary
// ============================================================================

bitflags! {
    /// Mouse buttons held or changed by an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u32 {
        const LEFT = 1;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// Key or button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Press,
    Release,
    Repeat,
}

/// Keyboard key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Insert,
    Delete,
    Shift,
    Control,
    Alt,
    Super,
    Char(char),
    /// Backend key code without a name in this vocabulary
    Other(u32),
}

/// Window input, already translated from the windowing backend
///
/// Coordinates are window pixels with the origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    MouseButton { button: MouseButtons, action: KeyAction },
    CursorMoved { x: f64, y: f64 },
    Scroll { dx: f64, dy: f64 },
    Key { key: Key, action: KeyAction },
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Registration handle returned when adding an event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HandlerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Cursor and button state of a window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerState {
    /// Current cursor position
    pub position: (f64, f64),
    /// Cursor position at the last button or key press
    pub press: (f64, f64),
    pub buttons: MouseButtons,
}

// ============================================================================
// Mesh handlers
// ============================================================================

/// Event delivered to the handlers of the mesh under the cursor
pub struct MeshEvent<'a> {
    pub key: MeshKey,
    pub mesh: &'a mut Mesh,
    /// Picked vertex, when the picking tier reports one
    pub vertex: Option<u32>,
    pub buttons: MouseButtons,
    pub position: (f64, f64),
}

/// Typed listener attached to one mesh
pub trait MeshEventHandler: Send {
    fn on_click(&mut self, _event: &mut MeshEvent<'_>) {}

    fn on_release(&mut self, _event: &mut MeshEvent<'_>) {}

    /// The cursor moved onto the mesh
    fn on_enter(&mut self, _event: &mut MeshEvent<'_>) {}

    /// The cursor left the mesh
    fn on_leave(&mut self, _event: &mut MeshEvent<'_>) {}

    /// The mesh is being removed from its scene
    fn on_dispose(&mut self, _key: MeshKey, _mesh: &Mesh) {}
}

// ============================================================================
// Camera handlers
// ============================================================================

/// Read access to the window's picking buffer during event dispatch
pub struct PickingAccess<'a> {
    pub(crate) buffer: &'a PickingBuffer,
    pub(crate) device: &'a mut dyn GraphicsDevice,
}

impl PickingAccess<'_> {
    /// Entity under a window pixel (origin top-left)
    pub fn pick(&mut self, x: i32, y: i32) -> Option<PickResult> {
        self.buffer.read_pixel(self.device, x, y).ok()
    }

    /// Depths of an inclusive window-pixel rectangle (origin top-left)
    pub fn pick_box(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<f32> {
        self.buffer.read_box(self.device, x0, y0, x1, y1).unwrap_or_default()
    }
}

/// What a camera handler can see and change while handling one event
pub struct EventContext<'a> {
    pub camera_key: CameraKey,
    pub scene: &'a mut Scene,
    pub picking: PickingAccess<'a>,
    /// Viewport of the frame under the cursor, or the whole window
    pub frame: Viewport,
    pub screen: (u32, u32),
    pub pointer: PointerState,
    /// Mesh under the cursor
    pub picked: Option<MeshKey>,
}

impl EventContext<'_> {
    /// The camera the handler is registered on
    pub fn camera(&mut self) -> Option<&mut Camera> {
        self.scene.camera_mut(self.camera_key).ok()
    }

    /// Fit the camera to every mesh it renders
    pub fn autofit(&mut self) -> bool {
        matches!(self.scene.autofit(self.camera_key), Ok(true))
    }
}

/// Typed listener attached to one camera
///
/// Every method defaults to doing nothing, so a handler only overrides
/// the events it reacts to.
pub trait CameraEventHandler: Send {
    fn on_click(&mut self, _ctx: &mut EventContext<'_>, _buttons: MouseButtons) {}

    fn on_move(&mut self, _ctx: &mut EventContext<'_>, _buttons: MouseButtons) {}

    fn on_release(&mut self, _ctx: &mut EventContext<'_>, _buttons: MouseButtons) {}

    fn on_scroll(&mut self, _ctx: &mut EventContext<'_>, _dx: f64, _dy: f64) {}

    fn on_key(&mut self, _ctx: &mut EventContext<'_>, _key: Key, _action: KeyAction) {}
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
