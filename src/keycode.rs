//! Keycode directory: portable key names and their 16-bit rawcodes.
//!
//! Every event the library delivers carries a `rawcode` from this code space.
//! Platform backends translate their native codes (virtual keys, X keycodes,
//! macOS keycodes) into it, so a name resolves to the same rawcode everywhere.
//!
//! The directory is built once on first use and never mutated afterwards.

use crate::state::{MASK_ALT, MASK_CAPS_LOCK, MASK_CTRL, MASK_META, MASK_SHIFT};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Sentinel name for rawcodes that are not in the directory.
pub const UNKNOWN_KEYCHAR: &str = "error";

/// Portable rawcodes.
pub mod code {
    pub const ESCAPE: u16 = 1;
    pub const DIGIT_1: u16 = 2;
    pub const DIGIT_2: u16 = 3;
    pub const DIGIT_3: u16 = 4;
    pub const DIGIT_4: u16 = 5;
    pub const DIGIT_5: u16 = 6;
    pub const DIGIT_6: u16 = 7;
    pub const DIGIT_7: u16 = 8;
    pub const DIGIT_8: u16 = 9;
    pub const DIGIT_9: u16 = 10;
    pub const DIGIT_0: u16 = 11;
    pub const MINUS: u16 = 12;
    pub const EQUAL: u16 = 13;
    pub const BACKSPACE: u16 = 14;
    pub const TAB: u16 = 15;
    pub const Q: u16 = 16;
    pub const W: u16 = 17;
    pub const E: u16 = 18;
    pub const R: u16 = 19;
    pub const T: u16 = 20;
    pub const Y: u16 = 21;
    pub const U: u16 = 22;
    pub const I: u16 = 23;
    pub const O: u16 = 24;
    pub const P: u16 = 25;
    pub const BRACKET_LEFT: u16 = 26;
    pub const BRACKET_RIGHT: u16 = 27;
    pub const ENTER: u16 = 28;
    pub const CONTROL_LEFT: u16 = 29;
    pub const A: u16 = 30;
    pub const S: u16 = 31;
    pub const D: u16 = 32;
    pub const F: u16 = 33;
    pub const G: u16 = 34;
    pub const H: u16 = 35;
    pub const J: u16 = 36;
    pub const K: u16 = 37;
    pub const L: u16 = 38;
    pub const SEMICOLON: u16 = 39;
    pub const QUOTE: u16 = 40;
    pub const GRAVE: u16 = 41;
    pub const SHIFT_LEFT: u16 = 42;
    pub const BACKSLASH: u16 = 43;
    pub const Z: u16 = 44;
    pub const X: u16 = 45;
    pub const C: u16 = 46;
    pub const V: u16 = 47;
    pub const B: u16 = 48;
    pub const N: u16 = 49;
    pub const M: u16 = 50;
    pub const COMMA: u16 = 51;
    pub const PERIOD: u16 = 52;
    pub const SLASH: u16 = 53;
    pub const SHIFT_RIGHT: u16 = 54;
    pub const NUMPAD_MULTIPLY: u16 = 55;
    pub const ALT_LEFT: u16 = 56;
    pub const SPACE: u16 = 57;
    pub const CAPS_LOCK: u16 = 58;

    pub const F1: u16 = 59;
    pub const F2: u16 = 60;
    pub const F3: u16 = 61;
    pub const F4: u16 = 62;
    pub const F5: u16 = 63;
    pub const F6: u16 = 64;
    pub const F7: u16 = 65;
    pub const F8: u16 = 66;
    pub const F9: u16 = 67;
    pub const F10: u16 = 68;
    pub const F11: u16 = 69;
    pub const F12: u16 = 70;

    pub const NUMPAD_7: u16 = 71;
    pub const NUMPAD_8: u16 = 72;
    pub const NUMPAD_9: u16 = 73;
    pub const NUMPAD_SUBTRACT: u16 = 74;
    pub const NUMPAD_4: u16 = 75;
    pub const NUMPAD_5: u16 = 76;
    pub const NUMPAD_6: u16 = 77;
    pub const NUMPAD_ADD: u16 = 78;
    pub const NUMPAD_1: u16 = 79;
    pub const NUMPAD_2: u16 = 80;
    pub const NUMPAD_3: u16 = 81;
    pub const NUMPAD_0: u16 = 82;
    pub const NUMPAD_DECIMAL: u16 = 83;

    // Extended function keys share the Windows virtual-key values.
    pub const F13: u16 = 124;
    pub const F14: u16 = 125;
    pub const F15: u16 = 126;
    pub const F16: u16 = 127;
    pub const F17: u16 = 128;
    pub const F18: u16 = 129;
    pub const F19: u16 = 130;
    pub const F20: u16 = 131;
    pub const F21: u16 = 132;
    pub const F22: u16 = 133;
    pub const F23: u16 = 134;
    pub const F24: u16 = 135;

    pub const NUMPAD_EQUAL: u16 = 0x0E0D;
    pub const NUMPAD_ENTER: u16 = 0x0E1C;
    pub const CONTROL_RIGHT: u16 = 0x0E1D;
    pub const NUMPAD_DIVIDE: u16 = 0x0E35;
    pub const PRINT_SCREEN: u16 = 0x0E37;
    pub const ALT_RIGHT: u16 = 0x0E38;
    pub const PAUSE: u16 = 0x0E45;
    pub const SCROLL_LOCK: u16 = 0x0E46;
    pub const HOME: u16 = 0x0E47;
    pub const PAGE_UP: u16 = 0x0E49;
    pub const END: u16 = 0x0E4F;
    pub const PAGE_DOWN: u16 = 0x0E51;
    pub const INSERT: u16 = 0x0E52;
    pub const DELETE: u16 = 0x0E53;
    pub const NUM_LOCK: u16 = 0x0E55;
    pub const META_LEFT: u16 = 0x0E5B;
    pub const META_RIGHT: u16 = 0x0E5C;
    pub const CONTEXT_MENU: u16 = 0x0E5D;

    pub const MEDIA_PREVIOUS: u16 = 0xE010;
    pub const MEDIA_NEXT: u16 = 0xE019;
    pub const VOLUME_MUTE: u16 = 0xE020;
    pub const MEDIA_PLAY: u16 = 0xE022;
    pub const MEDIA_STOP: u16 = 0xE024;
    pub const VOLUME_DOWN: u16 = 0xE02E;
    pub const VOLUME_UP: u16 = 0xE030;
    pub const ARROW_UP: u16 = 0xE048;
    pub const ARROW_LEFT: u16 = 0xE04B;
    pub const ARROW_RIGHT: u16 = 0xE04D;
    pub const ARROW_DOWN: u16 = 0xE050;
}

use code::*;

/// Base table. Order matters: the first name listed for a rawcode is canonical.
const BASE_KEYS: &[(&str, u16)] = &[
    // Letters
    ("a", A),
    ("b", B),
    ("c", C),
    ("d", D),
    ("e", E),
    ("f", F),
    ("g", G),
    ("h", H),
    ("i", I),
    ("j", J),
    ("k", K),
    ("l", L),
    ("m", M),
    ("n", N),
    ("o", O),
    ("p", P),
    ("q", Q),
    ("r", R),
    ("s", S),
    ("t", T),
    ("u", U),
    ("v", V),
    ("w", W),
    ("x", X),
    ("y", Y),
    ("z", Z),
    // Digits
    ("1", DIGIT_1),
    ("2", DIGIT_2),
    ("3", DIGIT_3),
    ("4", DIGIT_4),
    ("5", DIGIT_5),
    ("6", DIGIT_6),
    ("7", DIGIT_7),
    ("8", DIGIT_8),
    ("9", DIGIT_9),
    ("0", DIGIT_0),
    // Punctuation (US layout)
    ("`", GRAVE),
    ("-", MINUS),
    ("=", EQUAL),
    ("+", EQUAL),
    ("[", BRACKET_LEFT),
    ("]", BRACKET_RIGHT),
    ("\\", BACKSLASH),
    (";", SEMICOLON),
    ("'", QUOTE),
    (",", COMMA),
    (".", PERIOD),
    ("/", SLASH),
    ("grave", GRAVE),
    ("minus", MINUS),
    ("equal", EQUAL),
    ("comma", COMMA),
    ("period", PERIOD),
    ("slash", SLASH),
    ("backslash", BACKSLASH),
    ("semicolon", SEMICOLON),
    ("quote", QUOTE),
    // Function keys
    ("f1", F1),
    ("f2", F2),
    ("f3", F3),
    ("f4", F4),
    ("f5", F5),
    ("f6", F6),
    ("f7", F7),
    ("f8", F8),
    ("f9", F9),
    ("f10", F10),
    ("f11", F11),
    ("f12", F12),
    // Editing and whitespace
    ("esc", ESCAPE),
    ("escape", ESCAPE),
    ("backspace", BACKSPACE),
    ("tab", TAB),
    ("enter", ENTER),
    ("return", ENTER),
    ("space", SPACE),
    ("capslock", CAPS_LOCK),
    // Modifiers
    ("shift", SHIFT_LEFT),
    ("lshift", SHIFT_LEFT),
    ("rshift", SHIFT_RIGHT),
    ("ctrl", CONTROL_LEFT),
    ("control", CONTROL_LEFT),
    ("lctrl", CONTROL_LEFT),
    ("rctrl", CONTROL_RIGHT),
    ("alt", ALT_LEFT),
    ("option", ALT_LEFT),
    ("lalt", ALT_LEFT),
    ("ralt", ALT_RIGHT),
    ("meta", META_LEFT),
    ("command", META_LEFT),
    ("cmd", META_LEFT),
    ("super", META_LEFT),
    ("win", META_LEFT),
    ("rmeta", META_RIGHT),
    ("rcmd", META_RIGHT),
    // Navigation
    ("insert", INSERT),
    ("delete", DELETE),
    ("home", HOME),
    ("end", END),
    ("pageup", PAGE_UP),
    ("pagedown", PAGE_DOWN),
    ("up", ARROW_UP),
    ("down", ARROW_DOWN),
    ("left", ARROW_LEFT),
    ("right", ARROW_RIGHT),
    // Locks and system
    ("printscreen", PRINT_SCREEN),
    ("scrolllock", SCROLL_LOCK),
    ("pause", PAUSE),
    ("numlock", NUM_LOCK),
    ("menu", CONTEXT_MENU),
    // Numpad
    ("numpad0", NUMPAD_0),
    ("numpad1", NUMPAD_1),
    ("numpad2", NUMPAD_2),
    ("numpad3", NUMPAD_3),
    ("numpad4", NUMPAD_4),
    ("numpad5", NUMPAD_5),
    ("numpad6", NUMPAD_6),
    ("numpad7", NUMPAD_7),
    ("numpad8", NUMPAD_8),
    ("numpad9", NUMPAD_9),
    ("numpadadd", NUMPAD_ADD),
    ("numpadsubtract", NUMPAD_SUBTRACT),
    ("numpadmultiply", NUMPAD_MULTIPLY),
    ("numpaddivide", NUMPAD_DIVIDE),
    ("numpaddecimal", NUMPAD_DECIMAL),
    ("numpadenter", NUMPAD_ENTER),
    ("numpadequal", NUMPAD_EQUAL),
    // Media
    ("volumemute", VOLUME_MUTE),
    ("volumedown", VOLUME_DOWN),
    ("volumeup", VOLUME_UP),
    ("mediaplay", MEDIA_PLAY),
    ("mediastop", MEDIA_STOP),
    ("mediaprev", MEDIA_PREVIOUS),
    ("medianext", MEDIA_NEXT),
];

/// Additions applied on top of the base table at initialization.
const EXTENDED_FUNCTION_KEYS: &[(&str, u16)] = &[
    ("f13", F13),
    ("f14", F14),
    ("f15", F15),
    ("f16", F16),
    ("f17", F17),
    ("f18", F18),
    ("f19", F19),
    ("f20", F20),
    ("f21", F21),
    ("f22", F22),
    ("f23", F23),
    ("f24", F24),
];

/// Mouse button codes as carried in [`Event::button`](crate::Event::button).
pub mod mouse {
    pub const LEFT: u16 = 1;
    pub const RIGHT: u16 = 2;
    pub const CENTER: u16 = 3;
    pub const WHEEL_DOWN: u16 = 4;
    pub const WHEEL_UP: u16 = 5;
    pub const WHEEL_LEFT: u16 = 6;
    pub const WHEEL_RIGHT: u16 = 7;
    pub const BACK: u16 = 8;
    pub const FORWARD: u16 = 9;
}

const MOUSE_BUTTONS: &[(&str, u16)] = &[
    ("left", mouse::LEFT),
    ("right", mouse::RIGHT),
    ("center", mouse::CENTER),
    ("middle", mouse::CENTER),
    ("wheeldown", mouse::WHEEL_DOWN),
    ("wheelup", mouse::WHEEL_UP),
    ("wheelleft", mouse::WHEEL_LEFT),
    ("wheelright", mouse::WHEEL_RIGHT),
    ("back", mouse::BACK),
    ("forward", mouse::FORWARD),
];

/// Modifier bits contributed by a rawcode, or 0 for ordinary keys.
pub fn modifier_mask(rawcode: u16) -> u32 {
    match rawcode {
        SHIFT_LEFT | SHIFT_RIGHT => MASK_SHIFT,
        CONTROL_LEFT | CONTROL_RIGHT => MASK_CTRL,
        ALT_LEFT | ALT_RIGHT => MASK_ALT,
        META_LEFT | META_RIGHT => MASK_META,
        CAPS_LOCK => MASK_CAPS_LOCK,
        _ => 0,
    }
}

/// Bidirectional name/rawcode table.
#[derive(Debug)]
pub struct Directory {
    by_name: HashMap<&'static str, u16>,
    by_code: HashMap<u16, &'static str>,
    mouse_by_name: HashMap<&'static str, u16>,
    mouse_by_code: HashMap<u16, &'static str>,
}

impl Directory {
    fn build(tables: &[&[(&'static str, u16)]]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_code = HashMap::new();
        for &(name, raw) in tables.iter().flat_map(|t| t.iter()) {
            by_name.insert(name, raw);
            by_code.entry(raw).or_insert(name);
        }

        let mut mouse_by_name = HashMap::new();
        let mut mouse_by_code = HashMap::new();
        for &(name, raw) in MOUSE_BUTTONS {
            mouse_by_name.insert(name, raw);
            mouse_by_code.entry(raw).or_insert(name);
        }

        Self {
            by_name,
            by_code,
            mouse_by_name,
            mouse_by_code,
        }
    }

    /// Rawcode for `name`, or 0 when the name is unknown.
    ///
    /// Names are matched case-insensitively.
    pub fn lookup(&self, name: &str) -> u16 {
        if let Some(&raw) = self.by_name.get(name) {
            return raw;
        }
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            return self
                .by_name
                .get(name.to_ascii_lowercase().as_str())
                .copied()
                .unwrap_or(0);
        }
        0
    }

    /// Canonical name for `rawcode`, or `"error"` when it is unknown.
    pub fn reverse(&self, rawcode: u16) -> &'static str {
        self.by_code
            .get(&rawcode)
            .copied()
            .unwrap_or(UNKNOWN_KEYCHAR)
    }

    /// Whether `name` resolves to a modifier key (shift, ctrl, alt, meta, capslock).
    pub fn is_modifier(&self, name: &str) -> bool {
        modifier_mask(self.lookup(name)) != 0
    }

    /// All names whose rawcode is a modifier.
    pub fn modifier_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .by_name
            .iter()
            .filter(|&(_, &raw)| modifier_mask(raw) != 0)
            .map(|(&name, _)| name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Mouse button code for `name`, or 0 when unknown.
    pub fn mouse_button(&self, name: &str) -> u16 {
        self.mouse_by_name
            .get(name.to_ascii_lowercase().as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Canonical name of a mouse button code, or `"error"`.
    pub fn mouse_button_name(&self, button: u16) -> &'static str {
        self.mouse_by_code
            .get(&button)
            .copied()
            .unwrap_or(UNKNOWN_KEYCHAR)
    }

    /// Number of key names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the directory has no key names.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterate over `(name, rawcode)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.by_name.iter().map(|(&name, &raw)| (name, raw))
    }
}

/// The process-wide directory.
pub fn directory() -> &'static Directory {
    static DIRECTORY: OnceLock<Directory> = OnceLock::new();
    DIRECTORY.get_or_init(|| Directory::build(&[BASE_KEYS, EXTENDED_FUNCTION_KEYS]))
}

/// Rawcode for a key name; 0 if unknown.
pub fn keychar_to_rawcode(name: &str) -> u16 {
    directory().lookup(name)
}

/// Key name for a rawcode; `"error"` if unknown.
pub fn rawcode_to_keychar(rawcode: u16) -> &'static str {
    directory().reverse(rawcode)
}
