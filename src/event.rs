//! The portable event record.

use crate::keycode::{UNKNOWN_KEYCHAR, directory, mouse};
use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Wheel `direction` value for vertical scrolling.
pub const WHEEL_VERTICAL: u8 = 3;
/// Wheel `direction` value for horizontal scrolling.
pub const WHEEL_HORIZONTAL: u8 = 4;

/// The kind of input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventKind {
    /// A key went down.
    KeyDown,
    /// A key went up.
    KeyUp,
    /// Autorepeat of a key that is already down.
    KeyHold,
    /// A mouse button went down.
    MouseDown,
    /// A mouse button went up.
    MouseUp,
    /// The pointer moved with no button held.
    MouseMove,
    /// The pointer moved while a button was held.
    MouseDrag,
    /// The wheel turned.
    MouseWheel,
}

impl EventKind {
    /// Kinds a hotkey can trigger on.
    pub fn is_key(self) -> bool {
        matches!(self, EventKind::KeyDown | EventKind::KeyUp | EventKind::KeyHold)
    }

    /// Mouse kinds.
    pub fn is_mouse(self) -> bool {
        !self.is_key()
    }
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Button {
    /// Left mouse button.
    Left,
    /// Right mouse button.
    Right,
    /// Middle mouse button.
    Center,
    /// Wheel turned toward the user.
    WheelDown,
    /// Wheel turned away from the user.
    WheelUp,
    /// Horizontal wheel to the left.
    WheelLeft,
    /// Horizontal wheel to the right.
    WheelRight,
    /// Extra button 1 (typically back).
    Back,
    /// Extra button 2 (typically forward).
    Forward,
    /// Unknown or unsupported button.
    Unknown(u16),
}

impl Button {
    /// The button code carried in [`Event::button`].
    pub fn number(&self) -> u16 {
        match self {
            Button::Left => mouse::LEFT,
            Button::Right => mouse::RIGHT,
            Button::Center => mouse::CENTER,
            Button::WheelDown => mouse::WHEEL_DOWN,
            Button::WheelUp => mouse::WHEEL_UP,
            Button::WheelLeft => mouse::WHEEL_LEFT,
            Button::WheelRight => mouse::WHEEL_RIGHT,
            Button::Back => mouse::BACK,
            Button::Forward => mouse::FORWARD,
            Button::Unknown(n) => *n,
        }
    }

    /// Create a Button from its code.
    pub fn from_number(n: u16) -> Self {
        match n {
            mouse::LEFT => Button::Left,
            mouse::RIGHT => Button::Right,
            mouse::CENTER => Button::Center,
            mouse::WHEEL_DOWN => Button::WheelDown,
            mouse::WHEEL_UP => Button::WheelUp,
            mouse::WHEEL_LEFT => Button::WheelLeft,
            mouse::WHEEL_RIGHT => Button::WheelRight,
            mouse::BACK => Button::Back,
            mouse::FORWARD => Button::Forward,
            _ => Button::Unknown(n),
        }
    }
}

/// A normalized input event.
///
/// Fields that do not apply to the event's kind are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Modifier and button bits at event time (see [`crate::state`]).
    pub mask: u32,
    /// Portable rawcode from the keycode directory.
    pub rawcode: u16,
    /// Untranslated OS code (virtual key, X keycode, macOS keycode).
    pub native: u32,
    /// Directory name for `rawcode`, `"error"` when unknown.
    pub keychar: &'static str,
    /// Mouse button code, 0 for keyboard events.
    pub button: u16,
    /// Pointer x in screen coordinates.
    pub x: i32,
    /// Pointer y in screen coordinates.
    pub y: i32,
    /// Click count for presses of the same button in quick succession.
    pub clicks: u16,
    /// Signed wheel delta in platform units.
    pub rotation: i32,
    /// [`WHEEL_VERTICAL`] or [`WHEEL_HORIZONTAL`].
    pub direction: u8,
    /// Number of wheel notches.
    pub amount: u16,
    /// Monotonic time since the tap started.
    pub when: Duration,
}

impl Event {
    /// Create an empty event of the given kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            mask: 0,
            rawcode: 0,
            native: 0,
            keychar: UNKNOWN_KEYCHAR,
            button: 0,
            x: 0,
            y: 0,
            clicks: 0,
            rotation: 0,
            direction: 0,
            amount: 0,
            when: Duration::ZERO,
        }
    }

    /// Create a keyboard event; `keychar` is resolved from the directory.
    pub fn key(kind: EventKind, rawcode: u16) -> Self {
        let mut event = Self::new(kind);
        event.rawcode = rawcode;
        event.keychar = directory().reverse(rawcode);
        event
    }

    /// Create a mouse button or motion event.
    pub fn mouse(kind: EventKind, button: u16, x: i32, y: i32) -> Self {
        let mut event = Self::new(kind);
        event.button = button;
        event.x = x;
        event.y = y;
        event
    }

    /// Create a wheel event.
    pub fn wheel(x: i32, y: i32, rotation: i32, direction: u8, amount: u16) -> Self {
        let button = match (direction, rotation > 0) {
            (WHEEL_HORIZONTAL, true) => mouse::WHEEL_RIGHT,
            (WHEEL_HORIZONTAL, false) => mouse::WHEEL_LEFT,
            (_, true) => mouse::WHEEL_UP,
            (_, false) => mouse::WHEEL_DOWN,
        };
        let mut event = Self::mouse(EventKind::MouseWheel, button, x, y);
        event.rotation = rotation;
        event.direction = direction;
        event.amount = amount;
        event
    }

    /// Replace the mask.
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    /// Check if this is a keyboard event.
    pub fn is_keyboard(&self) -> bool {
        self.kind.is_key()
    }

    /// Check if this is a mouse event.
    pub fn is_mouse(&self) -> bool {
        self.kind.is_mouse()
    }

    /// The mouse button, if any.
    pub fn mouse_button(&self) -> Option<Button> {
        (self.button != 0).then(|| Button::from_number(self.button))
    }

    /// Serialize as a single JSON object.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Internal(e.to_string()))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.when.as_millis();
        match self.kind {
            EventKind::KeyDown | EventKind::KeyUp | EventKind::KeyHold => write!(
                f,
                "{ms} - {:?}: {{rawcode: {}, keychar: {}, mask: {:#x}}}",
                self.kind, self.rawcode, self.keychar, self.mask
            ),
            EventKind::MouseDown | EventKind::MouseUp => write!(
                f,
                "{ms} - {:?}: {{button: {}, x: {}, y: {}, clicks: {}, mask: {:#x}}}",
                self.kind, self.button, self.x, self.y, self.clicks, self.mask
            ),
            EventKind::MouseMove | EventKind::MouseDrag => write!(
                f,
                "{ms} - {:?}: {{x: {}, y: {}, mask: {:#x}}}",
                self.kind, self.x, self.y, self.mask
            ),
            EventKind::MouseWheel => write!(
                f,
                "{ms} - {:?}: {{x: {}, y: {}, rotation: {}, direction: {}, amount: {}}}",
                self.kind, self.x, self.y, self.rotation, self.direction, self.amount
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::code;

    #[test]
    fn test_key_event_resolves_keychar() {
        let event = Event::key(EventKind::KeyDown, code::F13);
        assert_eq!(event.keychar, "f13");
        assert_eq!(event.button, 0);
        assert!(event.is_keyboard());
        assert!(!event.is_mouse());
    }

    #[test]
    fn test_unknown_rawcode_is_error() {
        let event = Event::key(EventKind::KeyUp, 0xFFFF);
        assert_eq!(event.keychar, "error");
    }

    #[test]
    fn test_wheel_button_from_direction() {
        assert_eq!(
            Event::wheel(0, 0, 120, WHEEL_VERTICAL, 1).mouse_button(),
            Some(Button::WheelUp)
        );
        assert_eq!(
            Event::wheel(0, 0, -1, WHEEL_VERTICAL, 1).mouse_button(),
            Some(Button::WheelDown)
        );
        assert_eq!(
            Event::wheel(0, 0, 1, WHEEL_HORIZONTAL, 1).mouse_button(),
            Some(Button::WheelRight)
        );
    }

    #[test]
    fn test_button_numbers_round_trip() {
        for n in 1..=9 {
            assert_eq!(Button::from_number(n).number(), n);
        }
        assert_eq!(Button::from_number(42), Button::Unknown(42));
    }

    #[test]
    fn test_display() {
        let event = Event::key(EventKind::KeyDown, code::A).with_mask(0x2);
        assert_eq!(
            event.to_string(),
            "0 - KeyDown: {rawcode: 30, keychar: a, mask: 0x2}"
        );
        let click = Event::mouse(EventKind::MouseDown, mouse::LEFT, 10, 20);
        assert_eq!(
            click.to_string(),
            "0 - MouseDown: {button: 1, x: 10, y: 20, clicks: 0, mask: 0x0}"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_to_json() {
        let json = Event::key(EventKind::KeyDown, code::F13).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "KeyDown");
        assert_eq!(value["rawcode"], 124);
        assert_eq!(value["keychar"], "f13");
    }
}
