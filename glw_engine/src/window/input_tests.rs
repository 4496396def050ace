//! Unit tests for input.rs

use super::*;
use winit::dpi::PhysicalSize;

#[test]
fn test_resize_and_close() {
    let translator = InputTranslator::new();
    assert_eq!(
        translator.translate(&WindowEvent::Resized(PhysicalSize::new(640, 480))),
        Some(InputEvent::Resized { width: 640, height: 480 })
    );
    assert_eq!(translator.translate(&WindowEvent::CloseRequested), Some(InputEvent::CloseRequested));
    assert_eq!(translator.translate(&WindowEvent::Focused(true)), None);
}

#[test]
fn test_button_mapping() {
    assert_eq!(button_from_winit(MouseButton::Left), Some(MouseButtons::LEFT));
    assert_eq!(button_from_winit(MouseButton::Right), Some(MouseButtons::RIGHT));
    assert_eq!(button_from_winit(MouseButton::Middle), Some(MouseButtons::MIDDLE));
    assert_eq!(button_from_winit(MouseButton::Back), None);
}

#[test]
fn test_action_mapping() {
    assert_eq!(action_from_state(ElementState::Pressed, false), KeyAction::Press);
    assert_eq!(action_from_state(ElementState::Pressed, true), KeyAction::Repeat);
    assert_eq!(action_from_state(ElementState::Released, true), KeyAction::Release);
}

#[test]
fn test_key_mapping() {
    assert_eq!(key_from_winit(&WinitKey::Named(NamedKey::Escape)), Key::Escape);
    assert_eq!(key_from_winit(&WinitKey::Named(NamedKey::Insert)), Key::Insert);
    assert_eq!(key_from_winit(&WinitKey::Named(NamedKey::F1)), Key::Other(0));
    assert_eq!(key_from_winit(&WinitKey::Character("r".into())), Key::Char('r'));
}
