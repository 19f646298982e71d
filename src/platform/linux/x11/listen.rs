//! X11 input listening using X Record.
//!
//! Two connections are used: a control connection that owns the record
//! context, and a data connection that the context is enabled on. The data
//! connection is drained with `poll` so the loop can notice a stop request.

use crate::error::{Error, Result};
use crate::event::{WHEEL_HORIZONTAL, WHEEL_VERTICAL};
use crate::hook::TapSink;
use crate::keycode::mouse;
use crate::normalize::NativeEvent;
use crate::platform::linux::keycodes::keycode_to_rawcode;
use std::ffi::OsString;
use std::os::raw::{c_char, c_int, c_uchar, c_ulong};
use std::ptr::{null, null_mut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use x11::xlib;
use x11::xrecord;

pub const BACKEND: &str = "x11";

/// Sink for the record callback
static SINK: Mutex<Option<Arc<TapSink>>> = Mutex::new(None);

/// Set by `stop_tap`, cleared when a tap starts
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

const FALSE: c_int = 0;
const POLL_INTERVAL_MS: c_int = 50;

/// Leading fields of a core protocol input event as delivered by X Record.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RecordedEvent {
    kind: u8,
    detail: u8,
    _sequence: u16,
    _time: u32,
    _root: u32,
    _event: u32,
    _child: u32,
    root_x: i16,
    root_y: i16,
}

/// An open X connection, closed on drop.
struct Connection(*mut xlib::Display);

impl Connection {
    fn open() -> Result<Self> {
        let display = unsafe { xlib::XOpenDisplay(null()) };
        if display.is_null() {
            if wayland_session() {
                return Err(Error::Unsupported(
                    "Wayland sessions are not supported".into(),
                ));
            }
            return Err(Error::Internal("failed to open X display".into()));
        }
        Ok(Self(display))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe {
            xlib::XCloseDisplay(self.0);
        }
    }
}

/// A record context on the control connection, disabled and freed on drop.
struct RecordContext<'a> {
    control: &'a Connection,
    id: xrecord::XRecordContext,
}

impl Drop for RecordContext<'_> {
    fn drop(&mut self) {
        unsafe {
            xrecord::XRecordDisableContext(self.control.0, self.id);
            xrecord::XRecordFreeContext(self.control.0, self.id);
            xlib::XSync(self.control.0, FALSE);
        }
    }
}

/// Publishes the sink to the record callback for the lifetime of the guard.
struct SinkSlot;

impl SinkSlot {
    fn install(sink: Arc<TapSink>) -> Self {
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink);
        SinkSlot
    }
}

impl Drop for SinkSlot {
    fn drop(&mut self) {
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}

/// A Wayland compositor with no X server to talk to.
fn wayland_only(display: Option<OsString>, wayland: Option<OsString>) -> bool {
    non_empty(display).is_none() && non_empty(wayland).is_some()
}

fn wayland_session() -> bool {
    std::env::var("XDG_SESSION_TYPE").is_ok_and(|t| t.eq_ignore_ascii_case("wayland"))
        || non_empty(std::env::var_os("WAYLAND_DISPLAY")).is_some()
}

/// Translate one recorded core event.
fn translate(recorded: &RecordedEvent) -> Option<NativeEvent> {
    let x = i32::from(recorded.root_x);
    let y = i32::from(recorded.root_y);
    let detail = u32::from(recorded.detail);

    match c_int::from(recorded.kind) {
        xlib::KeyPress => Some(NativeEvent::key_press(keycode_to_rawcode(detail), detail)),
        xlib::KeyRelease => Some(NativeEvent::key_release(keycode_to_rawcode(detail), detail)),
        xlib::ButtonPress => match recorded.detail {
            // The wheel is reported as buttons 4 to 7.
            4 => Some(NativeEvent::wheel(x, y, 1, WHEEL_VERTICAL, 1)),
            5 => Some(NativeEvent::wheel(x, y, -1, WHEEL_VERTICAL, 1)),
            6 => Some(NativeEvent::wheel(x, y, -1, WHEEL_HORIZONTAL, 1)),
            7 => Some(NativeEvent::wheel(x, y, 1, WHEEL_HORIZONTAL, 1)),
            b => Some(NativeEvent::button_press(button_code(b), x, y)),
        },
        xlib::ButtonRelease => match recorded.detail {
            4..=7 => None,
            b => Some(NativeEvent::button_release(button_code(b), x, y)),
        },
        xlib::MotionNotify => Some(NativeEvent::motion(x, y)),
        _ => None,
    }
}

fn button_code(button: u8) -> u16 {
    match button {
        1 => mouse::LEFT,
        2 => mouse::CENTER,
        3 => mouse::RIGHT,
        8 => mouse::BACK,
        9 => mouse::FORWARD,
        b => u16::from(b),
    }
}

/// X Record callback, runs inside `XRecordProcessReplies` on the tap thread.
unsafe extern "C" fn record_callback(_closure: *mut c_char, raw: *mut xrecord::XRecordInterceptData) {
    let Some(data) = (unsafe { raw.as_ref() }) else {
        return;
    };

    let long_enough = (data.data_len as usize).saturating_mul(4) >= size_of::<RecordedEvent>();
    if data.category == xrecord::XRecordFromServer && long_enough && !data.data.is_null() {
        let recorded = unsafe { std::ptr::read_unaligned(data.data as *const RecordedEvent) };
        if let Some(native) = translate(&recorded)
            && let Ok(guard) = SINK.lock()
            && let Some(sink) = guard.as_ref()
        {
            sink.emit(native);
        }
    }

    unsafe {
        xrecord::XRecordFreeData(raw);
    }
}

fn create_context(control: &Connection) -> Result<RecordContext<'_>> {
    unsafe {
        let extension = xlib::XInitExtension(control.0, c"RECORD".as_ptr());
        if extension.is_null() {
            return Err(Error::Unsupported(
                "X Record extension not available".into(),
            ));
        }

        let range = xrecord::XRecordAllocRange();
        if range.is_null() {
            return Err(Error::Internal("failed to allocate X Record range".into()));
        }
        (*range).device_events.first = xlib::KeyPress as c_uchar;
        (*range).device_events.last = xlib::MotionNotify as c_uchar;

        let mut clients: c_ulong = xrecord::XRecordAllClients;
        let mut ranges = [range];
        let id = xrecord::XRecordCreateContext(
            control.0,
            0,
            &mut clients,
            1,
            ranges.as_mut_ptr(),
            1,
        );
        xlib::XFree(range.cast());

        if id == 0 {
            return Err(Error::Internal("failed to create X Record context".into()));
        }
        xlib::XSync(control.0, FALSE);
        Ok(RecordContext { control, id })
    }
}

/// Wait for the data connection to become readable. Returns `false` on timeout.
fn wait_readable(fd: c_int) -> Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let rc = unsafe { libc::poll(&mut pollfd, 1, POLL_INTERVAL_MS) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(Error::os(
            "poll on X Record connection failed",
            i64::from(err.raw_os_error().unwrap_or(0)),
        ));
    }
    if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        return Err(Error::Internal("X Record connection lost".into()));
    }
    Ok(rc > 0)
}

/// Run the X Record tap until the session stops (blocking).
pub fn run_tap(sink: Arc<TapSink>) -> Result<()> {
    if wayland_only(std::env::var_os("DISPLAY"), std::env::var_os("WAYLAND_DISPLAY")) {
        return Err(Error::Unsupported(
            "Wayland sessions are not supported".into(),
        ));
    }
    STOP_REQUESTED.store(false, Ordering::SeqCst);

    // Declaration order matters: the context is released before either connection closes.
    let control = Connection::open()?;
    let data = Connection::open()?;
    let context = create_context(&control)?;
    let _slot = SinkSlot::install(sink.clone());

    let enabled = unsafe {
        xrecord::XRecordEnableContextAsync(data.0, context.id, Some(record_callback), null_mut())
    };
    if enabled == 0 {
        return Err(Error::Internal("failed to enable X Record context".into()));
    }

    log::debug!("X Record context {} enabled", context.id);
    sink.ready();

    let fd = unsafe { xlib::XConnectionNumber(data.0) };
    while sink.is_running() && !STOP_REQUESTED.load(Ordering::SeqCst) {
        if wait_readable(fd)? {
            unsafe {
                xrecord::XRecordProcessReplies(data.0);
            }
        }
    }

    log::debug!("X Record context {} stopping", context.id);
    Ok(())
}

/// Ask the record loop to exit. It notices within one poll interval.
pub fn stop_tap() {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}
