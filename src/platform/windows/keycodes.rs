//! Windows virtual-key to rawcode translation.

use crate::keycode::code;

const LETTERS: [u16; 26] = [
    code::A,
    code::B,
    code::C,
    code::D,
    code::E,
    code::F,
    code::G,
    code::H,
    code::I,
    code::J,
    code::K,
    code::L,
    code::M,
    code::N,
    code::O,
    code::P,
    code::Q,
    code::R,
    code::S,
    code::T,
    code::U,
    code::V,
    code::W,
    code::X,
    code::Y,
    code::Z,
];

const NUMPAD_DIGITS: [u16; 10] = [
    code::NUMPAD_0,
    code::NUMPAD_1,
    code::NUMPAD_2,
    code::NUMPAD_3,
    code::NUMPAD_4,
    code::NUMPAD_5,
    code::NUMPAD_6,
    code::NUMPAD_7,
    code::NUMPAD_8,
    code::NUMPAD_9,
];

/// Convert a virtual-key code to a rawcode. Unknown codes map to 0.
///
/// `extended` is the low-level hook's extended-key flag; it separates the
/// numpad Enter from the main one.
pub fn vk_to_rawcode(vk: u32, extended: bool) -> u16 {
    match vk {
        0x41..=0x5A => LETTERS[(vk - 0x41) as usize],
        0x30 => code::DIGIT_0,
        0x31..=0x39 => code::DIGIT_1 + (vk - 0x31) as u16,
        0x70..=0x7B => code::F1 + (vk - 0x70) as u16,
        0x7C..=0x87 => code::F13 + (vk - 0x7C) as u16,
        0x60..=0x69 => NUMPAD_DIGITS[(vk - 0x60) as usize],

        0x08 => code::BACKSPACE,
        0x09 => code::TAB,
        0x0D if extended => code::NUMPAD_ENTER,
        0x0D => code::ENTER,
        0x10 | 0xA0 => code::SHIFT_LEFT,
        0xA1 => code::SHIFT_RIGHT,
        0x11 | 0xA2 => code::CONTROL_LEFT,
        0xA3 => code::CONTROL_RIGHT,
        0x12 | 0xA4 => code::ALT_LEFT,
        0xA5 => code::ALT_RIGHT,
        0x5B => code::META_LEFT,
        0x5C => code::META_RIGHT,
        0x5D => code::CONTEXT_MENU,
        0x13 => code::PAUSE,
        0x14 => code::CAPS_LOCK,
        0x1B => code::ESCAPE,
        0x20 => code::SPACE,
        0x21 => code::PAGE_UP,
        0x22 => code::PAGE_DOWN,
        0x23 => code::END,
        0x24 => code::HOME,
        0x25 => code::ARROW_LEFT,
        0x26 => code::ARROW_UP,
        0x27 => code::ARROW_RIGHT,
        0x28 => code::ARROW_DOWN,
        0x2C => code::PRINT_SCREEN,
        0x2D => code::INSERT,
        0x2E => code::DELETE,
        0x90 => code::NUM_LOCK,
        0x91 => code::SCROLL_LOCK,

        0x6A => code::NUMPAD_MULTIPLY,
        0x6B => code::NUMPAD_ADD,
        0x6D => code::NUMPAD_SUBTRACT,
        0x6E => code::NUMPAD_DECIMAL,
        0x6F => code::NUMPAD_DIVIDE,

        0xAD => code::VOLUME_MUTE,
        0xAE => code::VOLUME_DOWN,
        0xAF => code::VOLUME_UP,
        0xB0 => code::MEDIA_NEXT,
        0xB1 => code::MEDIA_PREVIOUS,
        0xB2 => code::MEDIA_STOP,
        0xB3 => code::MEDIA_PLAY,

        // OEM keys, US layout
        0xBA => code::SEMICOLON,
        0xBB => code::EQUAL,
        0xBC => code::COMMA,
        0xBD => code::MINUS,
        0xBE => code::PERIOD,
        0xBF => code::SLASH,
        0xC0 => code::GRAVE,
        0xDB => code::BRACKET_LEFT,
        0xDC => code::BACKSLASH,
        0xDD => code::BRACKET_RIGHT,
        0xDE => code::QUOTE,

        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::rawcode_to_keychar;

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(vk_to_rawcode(0x41, false), code::A);
        assert_eq!(vk_to_rawcode(0x5A, false), code::Z);
        assert_eq!(vk_to_rawcode(0x30, false), code::DIGIT_0);
        assert_eq!(vk_to_rawcode(0x39, false), code::DIGIT_9);
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(vk_to_rawcode(0x70, false), 59);
        assert_eq!(vk_to_rawcode(0x7B, false), 70);
        assert_eq!(vk_to_rawcode(0x7C, false), 124);
        assert_eq!(vk_to_rawcode(0x87, false), 135);
        assert_eq!(rawcode_to_keychar(vk_to_rawcode(0x7C, false)), "f13");
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(vk_to_rawcode(0xA0, false), code::SHIFT_LEFT);
        assert_eq!(vk_to_rawcode(0xA3, true), code::CONTROL_RIGHT);
        assert_eq!(vk_to_rawcode(0x5B, true), code::META_LEFT);
    }

    #[test]
    fn test_enter_split_by_extended_flag() {
        assert_eq!(vk_to_rawcode(0x0D, false), code::ENTER);
        assert_eq!(vk_to_rawcode(0x0D, true), code::NUMPAD_ENTER);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(vk_to_rawcode(0xFF, false), 0);
    }
}
