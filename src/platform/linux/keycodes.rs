//! X11 keycode to rawcode translation.
//!
//! X11 keycodes are evdev codes plus 8, and most of the evdev main block lines
//! up with the rawcode space, so those ranges translate by offset.

use crate::keycode::code;

// X11 keycode = evdev keycode + 8
const X11_EVDEV_OFFSET: u32 = 8;

/// Convert an X11 keycode to a rawcode. Unknown keycodes map to 0.
pub fn keycode_to_rawcode(keycode: u32) -> u16 {
    match keycode {
        // Escape through F10, then the numpad block
        9..=76 | 79..=91 => (keycode - X11_EVDEV_OFFSET) as u16,

        77 => code::NUM_LOCK,
        78 => code::SCROLL_LOCK,
        95 => code::F11,
        96 => code::F12,

        104 => code::NUMPAD_ENTER,
        105 => code::CONTROL_RIGHT,
        106 => code::NUMPAD_DIVIDE,
        107 => code::PRINT_SCREEN,
        108 => code::ALT_RIGHT,
        110 => code::HOME,
        111 => code::ARROW_UP,
        112 => code::PAGE_UP,
        113 => code::ARROW_LEFT,
        114 => code::ARROW_RIGHT,
        115 => code::END,
        116 => code::ARROW_DOWN,
        117 => code::PAGE_DOWN,
        118 => code::INSERT,
        119 => code::DELETE,
        121 => code::VOLUME_MUTE,
        122 => code::VOLUME_DOWN,
        123 => code::VOLUME_UP,
        125 => code::NUMPAD_EQUAL,
        127 => code::PAUSE,
        133 => code::META_LEFT,
        134 => code::META_RIGHT,
        135 => code::CONTEXT_MENU,

        171 => code::MEDIA_NEXT,
        172 => code::MEDIA_PLAY,
        173 => code::MEDIA_PREVIOUS,
        174 => code::MEDIA_STOP,

        // F13..F24 sit at evdev 183..194
        191..=202 => code::F13 + (keycode - 191) as u16,

        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::rawcode_to_keychar;

    #[test]
    fn test_main_block_by_offset() {
        assert_eq!(keycode_to_rawcode(9), code::ESCAPE);
        assert_eq!(keycode_to_rawcode(38), code::A);
        assert_eq!(keycode_to_rawcode(24), code::Q);
        assert_eq!(keycode_to_rawcode(52), code::Z);
        assert_eq!(keycode_to_rawcode(37), code::CONTROL_LEFT);
        assert_eq!(keycode_to_rawcode(50), code::SHIFT_LEFT);
        assert_eq!(keycode_to_rawcode(62), code::SHIFT_RIGHT);
        assert_eq!(keycode_to_rawcode(64), code::ALT_LEFT);
        assert_eq!(keycode_to_rawcode(65), code::SPACE);
        assert_eq!(keycode_to_rawcode(90), code::NUMPAD_0);
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(keycode_to_rawcode(67), code::F1);
        assert_eq!(keycode_to_rawcode(76), code::F10);
        assert_eq!(keycode_to_rawcode(95), code::F11);
        assert_eq!(keycode_to_rawcode(96), code::F12);
        assert_eq!(keycode_to_rawcode(191), 124);
        assert_eq!(keycode_to_rawcode(202), 135);
        assert_eq!(rawcode_to_keychar(keycode_to_rawcode(191)), "f13");
    }

    #[test]
    fn test_extended_keys() {
        assert_eq!(keycode_to_rawcode(105), code::CONTROL_RIGHT);
        assert_eq!(keycode_to_rawcode(108), code::ALT_RIGHT);
        assert_eq!(keycode_to_rawcode(133), code::META_LEFT);
        assert_eq!(keycode_to_rawcode(111), code::ARROW_UP);
        assert_eq!(keycode_to_rawcode(77), code::NUM_LOCK);
    }

    #[test]
    fn test_unknown_keycodes() {
        assert_eq!(keycode_to_rawcode(0), 0);
        assert_eq!(keycode_to_rawcode(94), 0);
        assert_eq!(keycode_to_rawcode(255), 0);
    }
}
