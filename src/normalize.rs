//! Conversion of native tap output into portable [`Event`]s.

use crate::config::HookConfig;
use crate::event::{Event, EventKind, WHEEL_VERTICAL};
use crate::state::KeyState;
use std::time::{Duration, Instant};

/// Native message category, as reported by a platform tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    KeyPress,
    KeyRelease,
    ButtonPress,
    ButtonRelease,
    Motion,
    Wheel,
}

/// Minimal fields a tap copies out of an OS event.
///
/// `rawcode` is already translated to the portable code space; `native` is the
/// untranslated OS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeEvent {
    pub kind: NativeKind,
    pub rawcode: u16,
    pub native: u32,
    pub button: u16,
    pub x: i32,
    pub y: i32,
    pub rotation: i32,
    pub direction: u8,
    /// Size of one wheel notch in `rotation` units (120 on Windows, 1 elsewhere).
    pub notch: i32,
}

impl NativeEvent {
    fn empty(kind: NativeKind) -> Self {
        Self {
            kind,
            rawcode: 0,
            native: 0,
            button: 0,
            x: 0,
            y: 0,
            rotation: 0,
            direction: 0,
            notch: 1,
        }
    }

    pub fn key_press(rawcode: u16, native: u32) -> Self {
        Self {
            rawcode,
            native,
            ..Self::empty(NativeKind::KeyPress)
        }
    }

    pub fn key_release(rawcode: u16, native: u32) -> Self {
        Self {
            rawcode,
            native,
            ..Self::empty(NativeKind::KeyRelease)
        }
    }

    pub fn button_press(button: u16, x: i32, y: i32) -> Self {
        Self {
            button,
            x,
            y,
            ..Self::empty(NativeKind::ButtonPress)
        }
    }

    pub fn button_release(button: u16, x: i32, y: i32) -> Self {
        Self {
            button,
            x,
            y,
            ..Self::empty(NativeKind::ButtonRelease)
        }
    }

    pub fn motion(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Self::empty(NativeKind::Motion)
        }
    }

    pub fn wheel(x: i32, y: i32, rotation: i32, direction: u8, notch: i32) -> Self {
        Self {
            x,
            y,
            rotation,
            direction,
            notch: notch.max(1),
            ..Self::empty(NativeKind::Wheel)
        }
    }
}

/// Presses further apart than this many pixels start a new click chain.
const CLICK_SLOP: i32 = 4;

#[derive(Debug, Clone, Copy)]
struct LastClick {
    button: u16,
    at: Instant,
    x: i32,
    y: i32,
    count: u16,
}

/// Stateful converter from [`NativeEvent`] to [`Event`].
///
/// Owns its own pressed-key set, used both for autorepeat detection and for
/// the modifier mask.
#[derive(Debug)]
pub struct Normalizer {
    started: Instant,
    keys: KeyState,
    last_click: Option<LastClick>,
    multi_click_interval: Duration,
}

impl Normalizer {
    /// Create a normalizer whose clock starts now.
    pub fn new(config: &HookConfig) -> Self {
        Self {
            started: Instant::now(),
            keys: KeyState::new(),
            last_click: None,
            multi_click_interval: config.multi_click_interval,
        }
    }

    /// Forget held keys and click history, e.g. after a tap restart.
    pub fn reset(&mut self) {
        self.keys.reset();
        self.last_click = None;
    }

    /// Convert one native event.
    pub fn normalize(&mut self, native: NativeEvent) -> Event {
        let now = Instant::now();
        let mut event = match native.kind {
            NativeKind::KeyPress => {
                let kind = if self.keys.press(native.rawcode) {
                    EventKind::KeyDown
                } else {
                    EventKind::KeyHold
                };
                Event::key(kind, native.rawcode)
            }
            NativeKind::KeyRelease => {
                self.keys.release(native.rawcode);
                Event::key(EventKind::KeyUp, native.rawcode)
            }
            NativeKind::ButtonPress => {
                self.keys.press_button(native.button);
                let clicks = self.count_click(native, now);
                let mut event = Event::mouse(EventKind::MouseDown, native.button, native.x, native.y);
                event.clicks = clicks;
                event
            }
            NativeKind::ButtonRelease => {
                self.keys.release_button(native.button);
                let clicks = match self.last_click {
                    Some(last) if last.button == native.button => last.count,
                    _ => 1,
                };
                let mut event = Event::mouse(EventKind::MouseUp, native.button, native.x, native.y);
                event.clicks = clicks;
                event
            }
            NativeKind::Motion => {
                if self.moved_away(native.x, native.y) {
                    self.last_click = None;
                }
                let kind = if self.keys.is_button_held() {
                    EventKind::MouseDrag
                } else {
                    EventKind::MouseMove
                };
                Event::mouse(kind, 0, native.x, native.y)
            }
            NativeKind::Wheel => {
                let direction = if native.direction == 0 {
                    WHEEL_VERTICAL
                } else {
                    native.direction
                };
                let notches = (native.rotation.unsigned_abs() / native.notch.unsigned_abs()).max(1);
                Event::wheel(
                    native.x,
                    native.y,
                    native.rotation,
                    direction,
                    u16::try_from(notches).unwrap_or(u16::MAX),
                )
            }
        };

        event.native = native.native;
        event.mask = self.keys.mask();
        event.when = now.saturating_duration_since(self.started);
        log::trace!("normalized {event}");
        event
    }

    fn count_click(&mut self, native: NativeEvent, now: Instant) -> u16 {
        let count = match self.last_click {
            Some(last)
                if last.button == native.button
                    && now.saturating_duration_since(last.at) <= self.multi_click_interval
                    && (last.x - native.x).abs() <= CLICK_SLOP
                    && (last.y - native.y).abs() <= CLICK_SLOP =>
            {
                last.count.saturating_add(1)
            }
            _ => 1,
        };
        self.last_click = Some(LastClick {
            button: native.button,
            at: now,
            x: native.x,
            y: native.y,
            count,
        });
        count
    }

    fn moved_away(&self, x: i32, y: i32) -> bool {
        self.last_click
            .is_some_and(|last| (last.x - x).abs() > CLICK_SLOP || (last.y - y).abs() > CLICK_SLOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WHEEL_HORIZONTAL;
    use crate::keycode::{code, mouse};
    use crate::state::{MASK_BUTTON1, MASK_CTRL, MASK_SHIFT};

    fn normalizer() -> Normalizer {
        Normalizer::new(&HookConfig::default())
    }

    #[test]
    fn test_autorepeat_becomes_hold() {
        let mut n = normalizer();
        let first = n.normalize(NativeEvent::key_press(code::A, 0x41));
        let second = n.normalize(NativeEvent::key_press(code::A, 0x41));
        let up = n.normalize(NativeEvent::key_release(code::A, 0x41));
        let again = n.normalize(NativeEvent::key_press(code::A, 0x41));

        assert_eq!(first.kind, EventKind::KeyDown);
        assert_eq!(second.kind, EventKind::KeyHold);
        assert_eq!(up.kind, EventKind::KeyUp);
        assert_eq!(again.kind, EventKind::KeyDown);
        assert_eq!(first.native, 0x41);
        assert_eq!(first.keychar, "a");
    }

    #[test]
    fn test_mask_from_pressed_keys() {
        let mut n = normalizer();
        n.normalize(NativeEvent::key_press(code::CONTROL_LEFT, 0));
        n.normalize(NativeEvent::key_press(code::SHIFT_RIGHT, 0));
        let event = n.normalize(NativeEvent::key_press(code::F13, 0));
        assert_eq!(event.mask, MASK_CTRL | MASK_SHIFT);

        n.normalize(NativeEvent::key_release(code::SHIFT_RIGHT, 0));
        let event = n.normalize(NativeEvent::key_release(code::F13, 0));
        assert_eq!(event.mask, MASK_CTRL);
    }

    #[test]
    fn test_unknown_rawcode_passes_through() {
        let mut n = normalizer();
        let event = n.normalize(NativeEvent::key_press(0, 0xDEAD));
        assert_eq!(event.keychar, "error");
        assert_eq!(event.native, 0xDEAD);
    }

    #[test]
    fn test_drag_detection() {
        let mut n = normalizer();
        assert_eq!(n.normalize(NativeEvent::motion(1, 1)).kind, EventKind::MouseMove);

        let down = n.normalize(NativeEvent::button_press(mouse::LEFT, 1, 1));
        assert_eq!(down.kind, EventKind::MouseDown);
        assert_eq!(down.mask, MASK_BUTTON1);

        let drag = n.normalize(NativeEvent::motion(50, 50));
        assert_eq!(drag.kind, EventKind::MouseDrag);

        n.normalize(NativeEvent::button_release(mouse::LEFT, 50, 50));
        assert_eq!(n.normalize(NativeEvent::motion(60, 60)).kind, EventKind::MouseMove);
    }

    #[test]
    fn test_click_counting() {
        let mut n = normalizer();
        let first = n.normalize(NativeEvent::button_press(mouse::LEFT, 10, 10));
        let up = n.normalize(NativeEvent::button_release(mouse::LEFT, 10, 10));
        let second = n.normalize(NativeEvent::button_press(mouse::LEFT, 11, 10));
        assert_eq!(first.clicks, 1);
        assert_eq!(up.clicks, 1);
        assert_eq!(second.clicks, 2);

        // A different button starts over.
        let right = n.normalize(NativeEvent::button_press(mouse::RIGHT, 11, 10));
        assert_eq!(right.clicks, 1);
    }

    #[test]
    fn test_click_chain_breaks_on_distance() {
        let mut n = normalizer();
        n.normalize(NativeEvent::button_press(mouse::LEFT, 10, 10));
        n.normalize(NativeEvent::button_release(mouse::LEFT, 10, 10));
        n.normalize(NativeEvent::motion(200, 200));
        let next = n.normalize(NativeEvent::button_press(mouse::LEFT, 200, 200));
        assert_eq!(next.clicks, 1);
    }

    #[test]
    fn test_click_chain_breaks_on_timeout() {
        let config = HookConfig::builder()
            .multi_click_interval(Duration::ZERO)
            .build()
            .unwrap();
        let mut n = Normalizer::new(&config);
        n.normalize(NativeEvent::button_press(mouse::LEFT, 0, 0));
        std::thread::sleep(Duration::from_millis(5));
        let next = n.normalize(NativeEvent::button_press(mouse::LEFT, 0, 0));
        assert_eq!(next.clicks, 1);
    }

    #[test]
    fn test_wheel_fields() {
        let mut n = normalizer();
        let win = n.normalize(NativeEvent::wheel(5, 6, -240, WHEEL_VERTICAL, 120));
        assert_eq!(win.kind, EventKind::MouseWheel);
        assert_eq!(win.rotation, -240);
        assert_eq!(win.direction, WHEEL_VERTICAL);
        assert_eq!(win.amount, 2);
        assert_eq!(win.button, mouse::WHEEL_DOWN);
        assert_eq!((win.x, win.y), (5, 6));

        let x11 = n.normalize(NativeEvent::wheel(0, 0, 1, WHEEL_HORIZONTAL, 1));
        assert_eq!(x11.amount, 1);
        assert_eq!(x11.direction, WHEEL_HORIZONTAL);
        assert_eq!(x11.button, mouse::WHEEL_RIGHT);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let mut n = normalizer();
        let a = n.normalize(NativeEvent::motion(0, 0));
        let b = n.normalize(NativeEvent::motion(1, 0));
        assert!(b.when >= a.when);
    }

    #[test]
    fn test_reset_forgets_pressed_keys() {
        let mut n = normalizer();
        n.normalize(NativeEvent::key_press(code::A, 0));
        n.reset();
        assert_eq!(
            n.normalize(NativeEvent::key_press(code::A, 0)).kind,
            EventKind::KeyDown
        );
    }
}
