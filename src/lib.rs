//! # keytap
//!
//! Cross-platform global keyboard and mouse hook with hotkey chords.
//!
//! ## Features
//!
//! - System-wide input capture on Windows (low-level hooks), macOS (event tap)
//!   and Linux/X11 (X Record)
//! - One portable event record for every platform, with autorepeat folded into `KeyHold`
//!   and drags told apart from moves
//! - Hotkey chords with exact modifier matching, dispatched on their own thread
//! - A bounded, lossy event stream that never blocks the OS callback
//!
//! ## Quick Start
//!
//! ```no_run
//! use keytap::{Event, EventKind, Hook};
//!
//! let hook = Hook::new();
//! hook.register_chord(EventKind::KeyDown, "ctrl+shift+f13", |e: &Event| {
//!     println!("hotkey at {:?}", e.when);
//! })?;
//!
//! let stream = hook.start()?;
//! for event in stream.iter() {
//!     if event.keychar == "esc" {
//!         break;
//!     }
//! }
//! hook.end()?;
//! # Ok::<(), keytap::Error>(())
//! ```
//!
//! ## Architecture
//!
//! A session runs a tap thread and a dispatcher thread. The tap copies the few
//! fields it needs out of each OS event and hands them to the normalizer, which
//! derives the modifier mask from the set of held keys rather than from OS
//! flags. Normalized events go onto the [`channel`] bus; the dispatcher and the
//! host each read their own subscription.
//!
//! The free functions at the crate root drive one process-wide [`Hook`].

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod hook;
pub mod hotkey;
pub mod keycode;
pub mod normalize;
pub mod state;

mod platform;

use std::sync::OnceLock;

// Re-exports
pub use channel::{EventBus, EventStream, RecvError};
pub use config::{HookConfig, HookConfigBuilder};
pub use error::{Error, Result};
pub use event::{Button, Event, EventKind};
pub use hook::{Hook, HookState, SystemTap, Tap, TapSink};
pub use hotkey::{Chord, EventHandler, HotkeyId};
pub use keycode::{directory, keychar_to_rawcode, rawcode_to_keychar};

static GLOBAL: OnceLock<Hook> = OnceLock::new();

/// The process-wide hook used by the free functions.
pub fn global() -> &'static Hook {
    GLOBAL.get_or_init(Hook::new)
}

/// Start the process-wide hook. See [`Hook::start`].
pub fn start() -> Result<EventStream> {
    global().start()
}

/// End the process-wide hook and clear its hotkeys. See [`Hook::end`].
pub fn end() -> Result<()> {
    global().end()
}

/// Register a hotkey on the process-wide hook.
///
/// ```no_run
/// use keytap::EventKind;
///
/// keytap::register(EventKind::KeyDown, &["f13", "ctrl"], |_: &keytap::Event| {
///     println!("ctrl+f13");
/// })?;
/// let _stream = keytap::start()?;
/// # Ok::<(), keytap::Error>(())
/// ```
pub fn register<S, H>(kind: EventKind, keys: &[S], handler: H) -> Result<HotkeyId>
where
    S: AsRef<str>,
    H: EventHandler + 'static,
{
    global().register(kind, keys, handler)
}

/// Remove a hotkey from the process-wide hook.
pub fn unregister(id: HotkeyId) {
    global().unregister(id);
}
