//! Windows input listening using SetWindowsHookEx.
//!
//! Both hooks are installed from the tap thread, so the OS calls back on that
//! thread while it pumps messages. `stop_tap` posts `WM_QUIT` to end the pump.

use crate::error::{Error, Result};
use crate::event::{WHEEL_HORIZONTAL, WHEEL_VERTICAL};
use crate::hook::TapSink;
use crate::keycode::mouse;
use crate::normalize::NativeEvent;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use windows::Win32::Foundation::{GetLastError, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, HC_ACTION, HHOOK, HOOKPROC, KBDLLHOOKSTRUCT, LLKHF_EXTENDED,
    MSG, MSLLHOOKSTRUCT, PM_NOREMOVE, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, WH_KEYBOARD_LL, WH_MOUSE_LL, WINDOWS_HOOK_ID, WM_KEYDOWN, WM_KEYUP,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE,
    WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
    WM_XBUTTONDOWN, WM_XBUTTONUP,
};

use super::keycodes::vk_to_rawcode;

pub const BACKEND: &str = "windows";

/// One wheel notch in `mouseData` units.
const WHEEL_DELTA: i32 = 120;

/// Sink for the hook callbacks
static SINK: Mutex<Option<Arc<TapSink>>> = Mutex::new(None);

/// Thread running the message loop, 0 when none
static THREAD_ID: AtomicU32 = AtomicU32::new(0);

/// An installed hook, removed on drop.
struct HookGuard(HHOOK);

impl HookGuard {
    fn install(id: WINDOWS_HOOK_ID, proc: HOOKPROC, what: &str) -> Result<Self> {
        unsafe {
            let module = GetModuleHandleW(None)
                .map_err(|e| Error::os("GetModuleHandleW failed", i64::from(e.code().0)))?;
            SetWindowsHookExW(id, proc, Some(module.into()), 0)
                .map(HookGuard)
                .map_err(|e| Error::os(&format!("failed to install {what} hook"), i64::from(e.code().0)))
        }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = UnhookWindowsHookEx(self.0) {
                log::error!("UnhookWindowsHookEx failed: {e}");
            }
        }
    }
}

/// Publishes the sink and message-loop thread for the lifetime of the guard.
struct Session;

impl Session {
    fn begin(sink: Arc<TapSink>) -> Self {
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink);
        THREAD_ID.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);
        Session
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        THREAD_ID.store(0, Ordering::SeqCst);
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn emit(native: NativeEvent) {
    if let Ok(guard) = SINK.lock()
        && let Some(sink) = guard.as_ref()
    {
        sink.emit(native);
    }
}

fn high_word(value: u32) -> u16 {
    (value >> 16) as u16
}

fn translate_key(msg: u32, vk: u32, extended: bool) -> Option<NativeEvent> {
    let rawcode = vk_to_rawcode(vk, extended);
    match msg {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(NativeEvent::key_press(rawcode, vk)),
        WM_KEYUP | WM_SYSKEYUP => Some(NativeEvent::key_release(rawcode, vk)),
        _ => None,
    }
}

fn xbutton(mouse_data: u32) -> u16 {
    match high_word(mouse_data) {
        1 => mouse::BACK,
        2 => mouse::FORWARD,
        other => other,
    }
}

fn translate_mouse(msg: u32, x: i32, y: i32, mouse_data: u32) -> Option<NativeEvent> {
    let delta = i32::from(high_word(mouse_data) as i16);
    match msg {
        WM_LBUTTONDOWN => Some(NativeEvent::button_press(mouse::LEFT, x, y)),
        WM_LBUTTONUP => Some(NativeEvent::button_release(mouse::LEFT, x, y)),
        WM_RBUTTONDOWN => Some(NativeEvent::button_press(mouse::RIGHT, x, y)),
        WM_RBUTTONUP => Some(NativeEvent::button_release(mouse::RIGHT, x, y)),
        WM_MBUTTONDOWN => Some(NativeEvent::button_press(mouse::CENTER, x, y)),
        WM_MBUTTONUP => Some(NativeEvent::button_release(mouse::CENTER, x, y)),
        WM_XBUTTONDOWN => Some(NativeEvent::button_press(xbutton(mouse_data), x, y)),
        WM_XBUTTONUP => Some(NativeEvent::button_release(xbutton(mouse_data), x, y)),
        WM_MOUSEMOVE => Some(NativeEvent::motion(x, y)),
        WM_MOUSEWHEEL => Some(NativeEvent::wheel(x, y, delta, WHEEL_VERTICAL, WHEEL_DELTA)),
        WM_MOUSEHWHEEL => Some(NativeEvent::wheel(x, y, delta, WHEEL_HORIZONTAL, WHEEL_DELTA)),
        _ => None,
    }
}

/// Keyboard hook callback
unsafe extern "system" fn keyboard_callback(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let kb = unsafe { *(lparam.0 as *const KBDLLHOOKSTRUCT) };
        let extended = kb.flags.0 & LLKHF_EXTENDED.0 != 0;
        if let Some(native) = translate_key(wparam.0 as u32, kb.vkCode, extended) {
            emit(native);
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

/// Mouse hook callback
unsafe extern "system" fn mouse_callback(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let ms = unsafe { *(lparam.0 as *const MSLLHOOKSTRUCT) };
        if let Some(native) = translate_mouse(wparam.0 as u32, ms.pt.x, ms.pt.y, ms.mouseData) {
            emit(native);
        }
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

/// Run the hooks and pump messages until `WM_QUIT` (blocking).
pub fn run_tap(sink: Arc<TapSink>) -> Result<()> {
    let _session = Session::begin(sink.clone());

    // Make sure this thread has a message queue before anyone posts to it.
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }

    let _keyboard = HookGuard::install(WH_KEYBOARD_LL, Some(keyboard_callback), "keyboard")?;
    let _mouse = HookGuard::install(WH_MOUSE_LL, Some(mouse_callback), "mouse")?;
    sink.ready();

    while sink.is_running() {
        let rc = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match rc.0 {
            0 => break,
            -1 => {
                let err = unsafe { GetLastError() };
                return Err(Error::os("GetMessageW failed", i64::from(err.0)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Post `WM_QUIT` to the message loop.
pub fn stop_tap() {
    let thread_id = THREAD_ID.load(Ordering::SeqCst);
    if thread_id == 0 {
        return;
    }
    unsafe {
        if let Err(e) = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
            log::warn!("failed to post WM_QUIT to tap thread: {e}");
        }
    }
}
