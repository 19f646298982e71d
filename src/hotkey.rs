//! Hotkey patterns, the registry that stores them, and the dispatcher that
//! matches inbound events against them.
//!
//! A pattern fires when its trigger kind equals the event kind, its primary key
//! equals the event rawcode, and its modifiers equal the held chord modifiers
//! exactly. Extra modifiers disqualify a match.

use crate::channel::EventStream;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::keycode::{directory, modifier_mask};
use crate::state::{KeyState, MASK_ALT, MASK_CHORD, MASK_CTRL, MASK_META, MASK_SHIFT};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// Trait for hotkey callbacks.
///
/// Callbacks run on the dispatcher thread, one at a time, and must return promptly.
pub trait EventHandler: Send + Sync {
    /// Called with the event that triggered the hotkey.
    fn handle_event(&self, event: &Event);
}

/// Implement EventHandler for closures.
impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle_event(&self, event: &Event) {
        self(event);
    }
}

/// Registration id returned by `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyId(u64);

impl HotkeyId {
    /// The raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated key combination: one primary key plus chord modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chord {
    key: u16,
    modifiers: u32,
}

impl Chord {
    /// Build a chord from key names.
    ///
    /// Exactly one name must be a non-modifier (the primary); all others must be
    /// shift, ctrl, alt or meta (any of their synonyms).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidPattern("no keys given".into()));
        }

        let dir = directory();
        let mut primary: Option<u16> = None;
        let mut modifiers = 0;
        for name in names {
            let name = name.as_ref().trim();
            let raw = dir.lookup(name);
            if raw == 0 {
                return Err(Error::UnknownKey(name.to_string()));
            }
            let bits = modifier_mask(raw) & MASK_CHORD;
            if bits != 0 {
                modifiers |= bits;
            } else if let Some(existing) = primary {
                return Err(Error::InvalidPattern(format!(
                    "more than one non-modifier key: {:?} and {:?}",
                    dir.reverse(existing),
                    name
                )));
            } else {
                primary = Some(raw);
            }
        }

        let key = primary.ok_or_else(|| {
            Error::InvalidPattern("a pattern needs exactly one non-modifier key".into())
        })?;
        Ok(Self { key, modifiers })
    }

    /// Parse a `+`-separated chord such as `"ctrl+shift+f13"`.
    ///
    /// A trailing `++` names the `+` key itself, as in `"ctrl++"`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (head, plus_key) = match trimmed.strip_suffix("++") {
            Some(head) => (head, true),
            None if trimmed == "+" => ("", true),
            None => (trimmed, false),
        };

        let mut parts: Vec<&str> = if head.is_empty() && plus_key {
            Vec::new()
        } else {
            head.split('+').collect()
        };
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::InvalidPattern(format!("malformed chord: {s:?}")));
        }
        if plus_key {
            parts.push("+");
        }
        Self::from_names(&parts)
    }

    /// The primary key's rawcode.
    pub fn key(&self) -> u16 {
        self.key
    }

    /// Required chord modifier bits.
    pub fn modifiers(&self) -> u32 {
        self.modifiers
    }

    /// Whether an event with `rawcode` and held chord modifiers `held` satisfies this chord.
    pub fn matches(&self, rawcode: u16, held: u32) -> bool {
        self.key == rawcode && self.modifiers == held & MASK_CHORD
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, name) in [
            (MASK_CTRL, "ctrl"),
            (MASK_ALT, "alt"),
            (MASK_SHIFT, "shift"),
            (MASK_META, "meta"),
        ] {
            if self.modifiers & bit != 0 {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(directory().reverse(self.key))
    }
}

/// A registered hotkey.
pub struct Pattern {
    id: HotkeyId,
    trigger: EventKind,
    chord: Chord,
    handler: Box<dyn EventHandler>,
}

impl Pattern {
    /// Registration id.
    pub fn id(&self) -> HotkeyId {
        self.id
    }

    /// Event kind that triggers this pattern.
    pub fn trigger(&self) -> EventKind {
        self.trigger
    }

    /// The key combination.
    pub fn chord(&self) -> &Chord {
        &self.chord
    }

    fn matches(&self, event: &Event, held: u32) -> bool {
        self.trigger == event.kind && self.chord.matches(event.rawcode, held)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("chord", &self.chord.to_string())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    patterns: Vec<Arc<Pattern>>,
}

/// Ordered, shared collection of hotkey patterns.
///
/// Clones refer to the same registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `chord` on events of kind `trigger`.
    ///
    /// Duplicate registrations get distinct ids and all of them fire.
    pub fn register<H>(&self, trigger: EventKind, chord: Chord, handler: H) -> Result<HotkeyId>
    where
        H: EventHandler + 'static,
    {
        if !trigger.is_key() {
            return Err(Error::InvalidPattern(format!(
                "hotkeys trigger on key events, not {trigger:?}"
            )));
        }

        let mut inner = self.lock();
        inner.next_id += 1;
        let id = HotkeyId(inner.next_id);
        log::debug!("registered hotkey {id}: {trigger:?} {chord}");
        inner.patterns.push(Arc::new(Pattern {
            id,
            trigger,
            chord,
            handler: Box::new(handler),
        }));
        Ok(id)
    }

    /// Remove a pattern. Returns `false` if the id was not registered.
    pub fn unregister(&self, id: HotkeyId) -> bool {
        let mut inner = self.lock();
        let before = inner.patterns.len();
        inner.patterns.retain(|p| p.id != id);
        let removed = inner.patterns.len() != before;
        if removed {
            log::debug!("unregistered hotkey {id}");
        }
        removed
    }

    /// Remove every pattern.
    pub fn clear(&self) {
        self.lock().patterns.clear();
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.lock().patterns.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the pattern list in registration order.
    pub fn snapshot(&self) -> Vec<Arc<Pattern>> {
        self.lock().patterns.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Matches events against a [`Registry`] and runs callbacks.
///
/// Owns the dispatcher's view of held keys; nothing else reads it.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Registry,
    keys: KeyState,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            keys: KeyState::new(),
        }
    }

    /// Process one event and return how many callbacks fired.
    ///
    /// A `KeyDown` for a key that is already down is rewritten to `KeyHold`
    /// before matching. Mouse events never match.
    pub fn dispatch(&mut self, mut event: Event) -> usize {
        match event.kind {
            EventKind::KeyDown => {
                if !self.keys.press(event.rawcode) {
                    event.kind = EventKind::KeyHold;
                }
            }
            EventKind::KeyUp => {
                self.keys.release(event.rawcode);
            }
            EventKind::KeyHold => {}
            _ => return 0,
        }

        let held = (self.keys.modifiers() | event.mask) & MASK_CHORD;

        // Snapshot so callbacks may register or unregister without deadlocking;
        // their changes apply from the next event on.
        let patterns = self.registry.snapshot();
        let mut fired = 0;
        for pattern in patterns.iter().filter(|p| p.matches(&event, held)) {
            fired += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                pattern.handler.handle_event(&event);
            }));
            if let Err(payload) = result {
                log::error!(
                    "hotkey {} ({}) callback panicked: {}",
                    pattern.id,
                    pattern.chord,
                    panic_message(payload.as_ref())
                );
            }
        }
        fired
    }

    /// Dispatch everything from `stream` until it closes.
    pub fn run(mut self, stream: EventStream) {
        while let Ok(event) = stream.recv() {
            self.dispatch(event);
        }
        log::debug!("dispatcher finished");
    }
}
