/// Translation of winit window events into the engine's input vocabulary

use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key as WinitKey, NamedKey};
use super::event::{InputEvent, Key, KeyAction, MouseButtons};

/// Pixel distance counted as one scroll line for touchpad deltas
pub const PIXELS_PER_LINE: f64 = 20.0;

/// Stateless mapper from `winit::event::WindowEvent` to [`InputEvent`]
#[derive(Debug, Clone, Copy)]
pub struct InputTranslator {
    pixels_per_line: f64,
}

impl Default for InputTranslator {
    fn default() -> Self {
        Self { pixels_per_line: PIXELS_PER_LINE }
    }
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pixels_per_line(mut self, pixels: f64) -> Self {
        self.pixels_per_line = pixels.max(f64::EPSILON);
        self
    }

    /// Engine event for a winit event, `None` for events the engine ignores
    pub fn translate(&self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::Resized(size) => Some(InputEvent::Resized { width: size.width, height: size.height }),
            WindowEvent::CloseRequested | WindowEvent::Destroyed => Some(InputEvent::CloseRequested),
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved { x: position.x, y: position.y }),
            WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::MouseButton {
                button: button_from_winit(*button)?,
                action: action_from_state(*state, false),
            }),
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (*x as f64, *y as f64),
                    MouseScrollDelta::PixelDelta(p) => (p.x / self.pixels_per_line, p.y / self.pixels_per_line),
                };
                Some(InputEvent::Scroll { dx, dy })
            }
            WindowEvent::KeyboardInput { event, .. } => Some(InputEvent::Key {
                key: key_from_winit(&event.logical_key),
                action: action_from_state(event.state, event.repeat),
            }),
            _ => None,
        }
    }
}

pub fn action_from_state(state: ElementState, repeat: bool) -> KeyAction {
    match (state, repeat) {
        (ElementState::Pressed, false) => KeyAction::Press,
        (ElementState::Pressed, true) => KeyAction::Repeat,
        (ElementState::Released, _) => KeyAction::Release,
    }
}

/// Engine button for a winit mouse button (extra buttons are ignored)
pub fn button_from_winit(button: MouseButton) -> Option<MouseButtons> {
    match button {
        MouseButton::Left => Some(MouseButtons::LEFT),
        MouseButton::Right => Some(MouseButtons::RIGHT),
        MouseButton::Middle => Some(MouseButtons::MIDDLE),
        _ => None,
    }
}

/// Engine key for a winit logical key
///
/// Characters are lowered to their first `char`; keys without a name in
/// the engine vocabulary map to `Key::Other(0)`.
pub fn key_from_winit(key: &WinitKey) -> Key {
    match key {
        WinitKey::Named(named) => match named {
            NamedKey::Escape => Key::Escape,
            NamedKey::Enter => Key::Enter,
            NamedKey::Tab => Key::Tab,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Insert => Key::Insert,
            NamedKey::Delete => Key::Delete,
            NamedKey::Shift => Key::Shift,
            NamedKey::Control => Key::Control,
            NamedKey::Alt => Key::Alt,
            NamedKey::Super => Key::Super,
            NamedKey::Space => Key::Char(' '),
            _ => Key::Other(0),
        },
        WinitKey::Character(text) => text.chars().next().map(Key::Char).unwrap_or(Key::Other(0)),
        _ => Key::Other(0),
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
