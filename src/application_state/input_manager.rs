//! # Input Manager
//!
//! Collects raw keyboard and mouse events between frames and turns them into a
//! [`ProcessedInputState`] once per frame.

use std::collections::HashMap;

use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::input_state::{MouseInput, ProcessedInputState, RawInputState};

const KEY_CODES: [KeyCode; 10] = [
    KeyCode::KeyW,
    KeyCode::KeyS,
    KeyCode::KeyA,
    KeyCode::KeyD,
    KeyCode::Space,
    KeyCode::ShiftLeft,
    KeyCode::KeyC,
    KeyCode::KeyV,
    KeyCode::KeyR,
    KeyCode::KeyT,
];

const MOUSE_BUTTONS: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

/// Manages the state of all tracked input devices.
pub struct InputManager {
    /// Previous state of all tracked keyboard keys
    pub keyboard_inputs_old: HashMap<KeyCode, bool>,
    /// Current state of all tracked keyboard keys
    pub keyboard_inputs_new: HashMap<KeyCode, bool>,
    pub mouse_inputs: MouseInput,
}

impl InputManager {
    /// Creates an input manager with every tracked key and button released.
    pub fn new() -> Self {
        let released = |keys: &[KeyCode]| keys.iter().map(|&k| (k, false)).collect::<HashMap<_, _>>();
        let buttons_released = || {
            MOUSE_BUTTONS
                .iter()
                .map(|&b| (b, false))
                .collect::<HashMap<_, _>>()
        };

        Self {
            keyboard_inputs_old: released(&KEY_CODES),
            keyboard_inputs_new: released(&KEY_CODES),
            mouse_inputs: MouseInput {
                mouse_button_inputs_old: buttons_released(),
                mouse_button_inputs_new: buttons_released(),
                mouse_delta: None,
            },
        }
    }

    /// Copies the current states into the previous states.
    pub fn move_old_states(&mut self) {
        for (key, new_state) in self.keyboard_inputs_new.iter() {
            if let Some(old_state) = self.keyboard_inputs_old.get_mut(key) {
                *old_state = *new_state;
            }
        }
        for (button, new_state) in self.mouse_inputs.mouse_button_inputs_new.iter() {
            if let Some(old_state) = self.mouse_inputs.mouse_button_inputs_old.get_mut(button) {
                *old_state = *new_state;
            }
        }
    }

    /// Records keyboard and mouse button events. Other events are ignored.
    pub fn intake_input(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state,
                        physical_key: PhysicalKey::Code(key),
                        ..
                    },
                ..
            } => {
                if let Some(key_state) = self.keyboard_inputs_new.get_mut(key) {
                    *key_state = *state == ElementState::Pressed;
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if let Some(button_state) = self.mouse_inputs.mouse_button_inputs_new.get_mut(button)
                {
                    *button_state = *state == ElementState::Pressed;
                }
            }
            _ => {}
        }
    }

    /// Adds raw mouse motion to this frame's delta.
    pub fn intake_mouse_motion(&mut self, delta: (f64, f64)) {
        let (x, y) = self.mouse_inputs.mouse_delta.unwrap_or((0.0, 0.0));
        self.mouse_inputs.mouse_delta = Some((x + delta.0, y + delta.1));
    }

    /// Builds the processed state from the previous and current raw states.
    pub fn create_processed_input_state(&self) -> ProcessedInputState {
        let keyboard_states = self
            .keyboard_inputs_new
            .iter()
            .map(|(key, &new_state)| {
                let old_state = self.keyboard_inputs_old.get(key).copied().unwrap_or(false);
                (*key, RawInputState::from_raw_states(old_state, new_state))
            })
            .collect();

        let mouse = &self.mouse_inputs;
        let mouse_button_states = mouse
            .mouse_button_inputs_new
            .iter()
            .map(|(button, &new_state)| {
                let old_state = mouse
                    .mouse_button_inputs_old
                    .get(button)
                    .copied()
                    .unwrap_or(false);
                (*button, RawInputState::from_raw_states(old_state, new_state))
            })
            .collect();

        ProcessedInputState {
            keyboard_states,
            mouse_button_states,
            mouse_delta: mouse.mouse_delta,
        }
    }

    /// Returns this frame's processed input and starts the next frame.
    pub fn get_and_reset_processed_input(&mut self) -> ProcessedInputState {
        let processed_input = self.create_processed_input_state();
        self.reset_inputs();
        processed_input
    }

    /// Starts a new frame: current states become previous, motion is cleared.
    pub fn reset_inputs(&mut self) {
        self.move_old_states();
        self.mouse_inputs.mouse_delta = None;
    }

    /// Releases every key and button, used when the window loses focus.
    pub fn release_all(&mut self) {
        self.keyboard_inputs_new.values_mut().for_each(|s| *s = false);
        self.mouse_inputs
            .mouse_button_inputs_new
            .values_mut()
            .for_each(|s| *s = false);
        self.reset_inputs();
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_then_hold_then_release() {
        let mut manager = InputManager::new();

        manager.keyboard_inputs_new.insert(KeyCode::KeyR, true);
        let first = manager.get_and_reset_processed_input();
        assert_eq!(first.get_key_state(KeyCode::KeyR), RawInputState::Pressed);

        let second = manager.get_and_reset_processed_input();
        assert_eq!(second.get_key_state(KeyCode::KeyR), RawInputState::Held);

        manager.keyboard_inputs_new.insert(KeyCode::KeyR, false);
        let third = manager.get_and_reset_processed_input();
        assert_eq!(third.get_key_state(KeyCode::KeyR), RawInputState::Released);
    }

    #[test]
    fn mouse_motion_accumulates_within_a_frame() {
        let mut manager = InputManager::new();
        manager.intake_mouse_motion((1.0, 2.0));
        manager.intake_mouse_motion((3.0, -1.0));

        let input = manager.get_and_reset_processed_input();
        assert_eq!(input.get_mouse_delta(), Some((4.0, 1.0)));
        assert_eq!(manager.create_processed_input_state().get_mouse_delta(), None);
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut manager = InputManager::new();
        manager.keyboard_inputs_new.insert(KeyCode::KeyW, true);
        manager.get_and_reset_processed_input();

        manager.release_all();

        let input = manager.create_processed_input_state();
        assert_eq!(input.get_key_state(KeyCode::KeyW), RawInputState::NotPressed);
    }
}
