//! Pressed-key and button state, and the modifier mask derived from it.
//!
//! Modifier bits are never taken from OS-supplied flags. They are computed from
//! the set of rawcodes currently held, which behaves the same on every platform.
//! Each owner (normalizer, dispatcher) keeps its own [`KeyState`].

use crate::keycode::modifier_mask;
use std::collections::HashSet;

// Keyboard modifier masks
/// Shift key mask.
pub const MASK_SHIFT: u32 = 1 << 0;
/// Control key mask.
pub const MASK_CTRL: u32 = 1 << 1;
/// Alt/Option key mask.
pub const MASK_ALT: u32 = 1 << 2;
/// Meta/Command/Windows/Super key mask.
pub const MASK_META: u32 = 1 << 3;
/// Caps Lock mask (set while the key is held).
pub const MASK_CAPS_LOCK: u32 = 1 << 4;

// Button masks
/// Left mouse button mask.
pub const MASK_BUTTON1: u32 = 1 << 8;
/// Right mouse button mask.
pub const MASK_BUTTON2: u32 = 1 << 9;
/// Middle mouse button mask.
pub const MASK_BUTTON3: u32 = 1 << 10;
/// Back (X1) button mask.
pub const MASK_BUTTON4: u32 = 1 << 11;
/// Forward (X2) button mask.
pub const MASK_BUTTON5: u32 = 1 << 12;

/// Modifiers that take part in hotkey chords.
pub const MASK_CHORD: u32 = MASK_SHIFT | MASK_CTRL | MASK_ALT | MASK_META;

/// All button masks combined.
pub const MASK_ALL_BUTTONS: u32 =
    MASK_BUTTON1 | MASK_BUTTON2 | MASK_BUTTON3 | MASK_BUTTON4 | MASK_BUTTON5;

/// Get the button mask for a mouse button code (see [`crate::keycode::mouse`]).
pub fn button_to_mask(button: u16) -> u32 {
    use crate::keycode::mouse;
    match button {
        mouse::LEFT => MASK_BUTTON1,
        mouse::RIGHT => MASK_BUTTON2,
        mouse::CENTER => MASK_BUTTON3,
        mouse::BACK => MASK_BUTTON4,
        mouse::FORWARD => MASK_BUTTON5,
        _ => 0,
    }
}

/// Keys and buttons currently held down.
#[derive(Debug, Default, Clone)]
pub struct KeyState {
    pressed: HashSet<u16>,
    buttons: u32,
}

impl KeyState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `rawcode` as down. Returns `false` if it was already down (autorepeat).
    pub fn press(&mut self, rawcode: u16) -> bool {
        self.pressed.insert(rawcode)
    }

    /// Mark `rawcode` as up. Returns `false` if it was not down.
    pub fn release(&mut self, rawcode: u16) -> bool {
        self.pressed.remove(&rawcode)
    }

    /// Whether `rawcode` is currently down.
    pub fn is_pressed(&self, rawcode: u16) -> bool {
        self.pressed.contains(&rawcode)
    }

    /// Mark a mouse button as down.
    pub fn press_button(&mut self, button: u16) {
        self.buttons |= button_to_mask(button);
    }

    /// Mark a mouse button as up.
    pub fn release_button(&mut self, button: u16) {
        self.buttons &= !button_to_mask(button);
    }

    /// Check if any mouse button is currently held.
    pub fn is_button_held(&self) -> bool {
        self.buttons & MASK_ALL_BUTTONS != 0
    }

    /// Modifier bits derived from the held keys.
    pub fn modifiers(&self) -> u32 {
        self.pressed
            .iter()
            .fold(0, |mask, &raw| mask | modifier_mask(raw))
    }

    /// Full mask: modifier bits plus held buttons.
    pub fn mask(&self) -> u32 {
        self.modifiers() | self.buttons
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.buttons = 0;
    }
}
