//! macOS input listening using CGEventTap.
//!
//! The tap is listen-only and attached to the tap thread's run loop. Creating
//! it fails without accessibility permission.

#![allow(unsafe_op_in_unsafe_fn)]

use crate::error::{Error, Result};
use crate::event::{WHEEL_HORIZONTAL, WHEEL_VERTICAL};
use crate::hook::TapSink;
use crate::keycode::mouse;
use crate::normalize::NativeEvent;
use core::ptr::NonNull;
use objc2_core_foundation::{CFMachPort, CFRetained, CFRunLoop, kCFRunLoopCommonModes};
use objc2_core_graphics::{
    CGEvent, CGEventField, CGEventFlags, CGEventTapCallBack, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, kCGEventMaskForAllEvents,
};
use objc2_foundation::NSAutoreleasePool;
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::keycodes::keycode_to_rawcode;

pub const BACKEND: &str = "macos";

/// Sink for the tap callback
static SINK: Mutex<Option<Arc<TapSink>>> = Mutex::new(None);

/// Set by `stop_tap`, cleared when a tap starts
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Run loop of the tap thread, so `stop_tap` can stop it from elsewhere.
struct RunLoopHandle(CFRetained<CFRunLoop>);
unsafe impl Send for RunLoopHandle {}
unsafe impl Sync for RunLoopHandle {}

static RUN_LOOP: Mutex<Option<RunLoopHandle>> = Mutex::new(None);

/// The tap's mach port, for re-enabling it from the callback.
/// Only dereferenced on the tap thread while `run_tap` holds the port.
struct TapPointer(*const CFMachPort);
unsafe impl Send for TapPointer {}
unsafe impl Sync for TapPointer {}

static EVENT_TAP: Mutex<Option<TapPointer>> = Mutex::new(None);

#[link(name = "Cocoa", kind = "framework")]
unsafe extern "C" {}

// Device-dependent modifier bits (NX_DEVICE*KEYMASK), one per physical key.
const DEVICE_LCTL: u64 = 0x0000_0001;
const DEVICE_LSHIFT: u64 = 0x0000_0002;
const DEVICE_RSHIFT: u64 = 0x0000_0004;
const DEVICE_LCMD: u64 = 0x0000_0008;
const DEVICE_RCMD: u64 = 0x0000_0010;
const DEVICE_LALT: u64 = 0x0000_0020;
const DEVICE_RALT: u64 = 0x0000_0040;
const DEVICE_RCTL: u64 = 0x0000_2000;

/// What a `FlagsChanged` event means for the key that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagChange {
    Press,
    Release,
    /// Caps lock reports its toggle state, not the key position.
    Tap,
}

fn classify_flags(keycode: u16, flags: u64) -> Option<FlagChange> {
    let bit = match keycode {
        0x38 => DEVICE_LSHIFT,
        0x3C => DEVICE_RSHIFT,
        0x3B => DEVICE_LCTL,
        0x3E => DEVICE_RCTL,
        0x3A => DEVICE_LALT,
        0x3D => DEVICE_RALT,
        0x37 => DEVICE_LCMD,
        0x36 => DEVICE_RCMD,
        0x39 => return Some(FlagChange::Tap),
        _ => return None,
    };
    Some(if flags & bit != 0 {
        FlagChange::Press
    } else {
        FlagChange::Release
    })
}

fn other_button(number: i64) -> u16 {
    match number {
        2 => mouse::CENTER,
        3 => mouse::BACK,
        4 => mouse::FORWARD,
        n => u16::try_from(n + 1).unwrap_or(0),
    }
}

/// Vertical wheel deltas are positive away from the user; horizontal ones are
/// positive to the left, so they are flipped to read positive to the right.
fn wheel(x: i32, y: i32, vertical: i64, horizontal: i64) -> Option<NativeEvent> {
    let clamp = |v: i64| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    if vertical != 0 {
        Some(NativeEvent::wheel(x, y, clamp(vertical), WHEEL_VERTICAL, 1))
    } else if horizontal != 0 {
        Some(NativeEvent::wheel(x, y, clamp(-horizontal), WHEEL_HORIZONTAL, 1))
    } else {
        None
    }
}

fn emit(native: NativeEvent) {
    if let Ok(guard) = SINK.lock()
        && let Some(sink) = guard.as_ref()
    {
        sink.emit(native);
    }
}

fn stop_current_loop() {
    if let Some(run_loop) = CFRunLoop::current() {
        run_loop.stop();
    }
}

/// Translate one tap event and hand it to the sink.
unsafe fn forward(event_type: CGEventType, cg_event: &CGEvent) {
    let point = CGEvent::location(Some(cg_event));
    let (x, y) = (point.x as i32, point.y as i32);
    let field = |f| CGEvent::integer_value_field(Some(cg_event), f);

    match event_type {
        CGEventType::KeyDown | CGEventType::KeyUp => {
            let keycode = field(CGEventField::KeyboardEventKeycode) as u16;
            let rawcode = keycode_to_rawcode(keycode);
            let native = u32::from(keycode);
            emit(if event_type == CGEventType::KeyDown {
                NativeEvent::key_press(rawcode, native)
            } else {
                NativeEvent::key_release(rawcode, native)
            });
        }

        CGEventType::FlagsChanged => {
            let keycode = field(CGEventField::KeyboardEventKeycode) as u16;
            let rawcode = keycode_to_rawcode(keycode);
            let native = u32::from(keycode);
            let flags: CGEventFlags = CGEvent::flags(Some(cg_event));
            match classify_flags(keycode, flags.0) {
                Some(FlagChange::Press) => emit(NativeEvent::key_press(rawcode, native)),
                Some(FlagChange::Release) => emit(NativeEvent::key_release(rawcode, native)),
                Some(FlagChange::Tap) => {
                    emit(NativeEvent::key_press(rawcode, native));
                    emit(NativeEvent::key_release(rawcode, native));
                }
                None => {}
            }
        }

        CGEventType::LeftMouseDown => emit(NativeEvent::button_press(mouse::LEFT, x, y)),
        CGEventType::LeftMouseUp => emit(NativeEvent::button_release(mouse::LEFT, x, y)),
        CGEventType::RightMouseDown => emit(NativeEvent::button_press(mouse::RIGHT, x, y)),
        CGEventType::RightMouseUp => emit(NativeEvent::button_release(mouse::RIGHT, x, y)),
        CGEventType::OtherMouseDown => {
            let button = other_button(field(CGEventField::MouseEventButtonNumber));
            emit(NativeEvent::button_press(button, x, y));
        }
        CGEventType::OtherMouseUp => {
            let button = other_button(field(CGEventField::MouseEventButtonNumber));
            emit(NativeEvent::button_release(button, x, y));
        }

        // Drag is derived from held buttons, so all motion is reported alike.
        CGEventType::MouseMoved
        | CGEventType::LeftMouseDragged
        | CGEventType::RightMouseDragged
        | CGEventType::OtherMouseDragged => emit(NativeEvent::motion(x, y)),

        CGEventType::ScrollWheel => {
            let vertical = field(CGEventField::ScrollWheelEventDeltaAxis1);
            let horizontal = field(CGEventField::ScrollWheelEventDeltaAxis2);
            if let Some(native) = wheel(x, y, vertical, horizontal) {
                emit(native);
            }
        }

        _ => {}
    }
}

/// The CGEventTap callback
unsafe extern "C-unwind" fn event_callback(
    _proxy: CGEventTapProxy,
    event_type: CGEventType,
    cg_event: NonNull<CGEvent>,
    _user_info: *mut c_void,
) -> *mut CGEvent {
    if STOP_REQUESTED.load(Ordering::SeqCst) {
        stop_current_loop();
        return cg_event.as_ptr();
    }

    // The system disables a tap whose callback is too slow; turn it back on.
    if event_type == CGEventType::TapDisabledByTimeout
        || event_type == CGEventType::TapDisabledByUserInput
    {
        if let Ok(guard) = EVENT_TAP.lock()
            && let Some(tap) = guard.as_ref()
            && !tap.0.is_null()
        {
            log::warn!("event tap was disabled ({event_type:?}), re-enabling");
            CGEvent::tap_enable(&*tap.0, true);
        }
        return cg_event.as_ptr();
    }

    forward(event_type, cg_event.as_ref());
    cg_event.as_ptr()
}

/// Clears the statics the callback and `stop_tap` read when the tap exits.
struct Registration;

impl Drop for Registration {
    fn drop(&mut self) {
        *EVENT_TAP.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *RUN_LOOP.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Run the event tap on this thread's run loop (blocking).
pub fn run_tap(sink: Arc<TapSink>) -> Result<()> {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
    *SINK.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink.clone());
    let _registration = Registration;

    unsafe {
        let _pool = NSAutoreleasePool::new();

        let callback: CGEventTapCallBack = Some(event_callback);
        let tap = CGEvent::tap_create(
            CGEventTapLocation::HIDEventTap,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            kCGEventMaskForAllEvents.into(),
            callback,
            null_mut(),
        )
        .ok_or_else(|| {
            Error::PermissionDenied(
                "failed to create event tap, grant Accessibility permission to this process"
                    .into(),
            )
        })?;

        *EVENT_TAP.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(TapPointer(&*tap as *const CFMachPort));

        let source = CFMachPort::new_run_loop_source(None, Some(&tap), 0)
            .ok_or_else(|| Error::Internal("failed to create run loop source".into()))?;
        let current_loop = CFRunLoop::current()
            .ok_or_else(|| Error::Internal("failed to get current run loop".into()))?;

        current_loop.add_source(Some(&source), kCFRunLoopCommonModes);
        *RUN_LOOP.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(RunLoopHandle(current_loop.clone()));

        CGEvent::tap_enable(&tap, true);
        sink.ready();

        if sink.is_running() && !STOP_REQUESTED.load(Ordering::SeqCst) {
            CFRunLoop::run();
        }

        CGEvent::tap_enable(&tap, false);
        current_loop.remove_source(Some(&source), kCFRunLoopCommonModes);
    }

    Ok(())
}

/// Stop the tap thread's run loop.
pub fn stop_tap() {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
    if let Some(handle) = RUN_LOOP.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        handle.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NativeKind;

    #[test]
    fn test_classify_flags_per_side() {
        assert_eq!(classify_flags(0x38, DEVICE_LSHIFT), Some(FlagChange::Press));
        // Left shift released while right shift is still down.
        assert_eq!(classify_flags(0x38, DEVICE_RSHIFT), Some(FlagChange::Release));
        assert_eq!(classify_flags(0x3E, DEVICE_RCTL), Some(FlagChange::Press));
        assert_eq!(classify_flags(0x37, 0), Some(FlagChange::Release));
        assert_eq!(classify_flags(0x39, 0), Some(FlagChange::Tap));
        assert_eq!(classify_flags(0x3F, 0), None);
    }

    #[test]
    fn test_other_buttons() {
        assert_eq!(other_button(2), mouse::CENTER);
        assert_eq!(other_button(3), mouse::BACK);
        assert_eq!(other_button(4), mouse::FORWARD);
    }

    #[test]
    fn test_wheel_axes() {
        let up = wheel(0, 0, 2, 0).unwrap();
        assert_eq!(up.kind, NativeKind::Wheel);
        assert_eq!((up.rotation, up.direction), (2, WHEEL_VERTICAL));

        let right = wheel(0, 0, 0, -1).unwrap();
        assert_eq!((right.rotation, right.direction), (1, WHEEL_HORIZONTAL));

        assert!(wheel(0, 0, 0, 0).is_none());
    }
}
