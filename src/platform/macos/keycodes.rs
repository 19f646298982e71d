//! macOS virtual keycode to rawcode translation.

use crate::keycode::code;

/// Convert a macOS virtual keycode (`kVK_*`) to a rawcode. Unknown keycodes map to 0.
pub fn keycode_to_rawcode(keycode: u16) -> u16 {
    match keycode {
        0x00 => code::A,
        0x01 => code::S,
        0x02 => code::D,
        0x03 => code::F,
        0x04 => code::H,
        0x05 => code::G,
        0x06 => code::Z,
        0x07 => code::X,
        0x08 => code::C,
        0x09 => code::V,
        0x0B => code::B,
        0x0C => code::Q,
        0x0D => code::W,
        0x0E => code::E,
        0x0F => code::R,
        0x10 => code::Y,
        0x11 => code::T,
        0x12 => code::DIGIT_1,
        0x13 => code::DIGIT_2,
        0x14 => code::DIGIT_3,
        0x15 => code::DIGIT_4,
        0x16 => code::DIGIT_6,
        0x17 => code::DIGIT_5,
        0x18 => code::EQUAL,
        0x19 => code::DIGIT_9,
        0x1A => code::DIGIT_7,
        0x1B => code::MINUS,
        0x1C => code::DIGIT_8,
        0x1D => code::DIGIT_0,
        0x1E => code::BRACKET_RIGHT,
        0x1F => code::O,
        0x20 => code::U,
        0x21 => code::BRACKET_LEFT,
        0x22 => code::I,
        0x23 => code::P,
        0x24 => code::ENTER,
        0x25 => code::L,
        0x26 => code::J,
        0x27 => code::QUOTE,
        0x28 => code::K,
        0x29 => code::SEMICOLON,
        0x2A => code::BACKSLASH,
        0x2B => code::COMMA,
        0x2C => code::SLASH,
        0x2D => code::N,
        0x2E => code::M,
        0x2F => code::PERIOD,
        0x30 => code::TAB,
        0x31 => code::SPACE,
        0x32 => code::GRAVE,
        0x33 => code::BACKSPACE,
        0x35 => code::ESCAPE,

        // Modifiers
        0x36 => code::META_RIGHT,
        0x37 => code::META_LEFT,
        0x38 => code::SHIFT_LEFT,
        0x39 => code::CAPS_LOCK,
        0x3A => code::ALT_LEFT,
        0x3B => code::CONTROL_LEFT,
        0x3C => code::SHIFT_RIGHT,
        0x3D => code::ALT_RIGHT,
        0x3E => code::CONTROL_RIGHT,

        // Keypad
        0x41 => code::NUMPAD_DECIMAL,
        0x43 => code::NUMPAD_MULTIPLY,
        0x45 => code::NUMPAD_ADD,
        0x47 => code::NUM_LOCK,
        0x4B => code::NUMPAD_DIVIDE,
        0x4C => code::NUMPAD_ENTER,
        0x4E => code::NUMPAD_SUBTRACT,
        0x51 => code::NUMPAD_EQUAL,
        0x52 => code::NUMPAD_0,
        0x53 => code::NUMPAD_1,
        0x54 => code::NUMPAD_2,
        0x55 => code::NUMPAD_3,
        0x56 => code::NUMPAD_4,
        0x57 => code::NUMPAD_5,
        0x58 => code::NUMPAD_6,
        0x59 => code::NUMPAD_7,
        0x5B => code::NUMPAD_8,
        0x5C => code::NUMPAD_9,

        0x48 => code::VOLUME_UP,
        0x49 => code::VOLUME_DOWN,
        0x4A => code::VOLUME_MUTE,

        // Function keys
        0x7A => code::F1,
        0x78 => code::F2,
        0x63 => code::F3,
        0x76 => code::F4,
        0x60 => code::F5,
        0x61 => code::F6,
        0x62 => code::F7,
        0x64 => code::F8,
        0x65 => code::F9,
        0x6D => code::F10,
        0x67 => code::F11,
        0x6F => code::F12,
        0x69 => code::F13,
        0x6B => code::F14,
        0x71 => code::F15,
        0x6A => code::F16,
        0x40 => code::F17,
        0x4F => code::F18,
        0x50 => code::F19,
        0x5A => code::F20,

        // Navigation
        0x6E => code::CONTEXT_MENU,
        0x72 => code::INSERT,
        0x73 => code::HOME,
        0x74 => code::PAGE_UP,
        0x75 => code::DELETE,
        0x77 => code::END,
        0x79 => code::PAGE_DOWN,
        0x7B => code::ARROW_LEFT,
        0x7C => code::ARROW_RIGHT,
        0x7D => code::ARROW_DOWN,
        0x7E => code::ARROW_UP,

        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::rawcode_to_keychar;

    #[test]
    fn test_letters() {
        assert_eq!(keycode_to_rawcode(0x00), code::A);
        assert_eq!(keycode_to_rawcode(0x06), code::Z);
        assert_eq!(rawcode_to_keychar(keycode_to_rawcode(0x0C)), "q");
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(keycode_to_rawcode(0x7A), 59);
        assert_eq!(keycode_to_rawcode(0x6F), 70);
        assert_eq!(keycode_to_rawcode(0x69), 124);
        assert_eq!(keycode_to_rawcode(0x5A), 131);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(keycode_to_rawcode(0x37), code::META_LEFT);
        assert_eq!(keycode_to_rawcode(0x3E), code::CONTROL_RIGHT);
        assert_eq!(keycode_to_rawcode(0x39), code::CAPS_LOCK);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(keycode_to_rawcode(0x3F), 0);
        assert_eq!(keycode_to_rawcode(0xFF), 0);
    }
}
