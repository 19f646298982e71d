//! The session-owning [`Hook`], the [`Tap`] seam, and the thread supervision around them.
//!
//! A session runs two threads. The tap thread sits in the platform's event
//! loop and feeds a [`TapSink`], which normalizes native events and publishes
//! them on the bus. The dispatcher thread consumes its own subscription of the
//! bus and runs hotkey callbacks.

use crate::channel::{EventBus, EventStream};
use crate::config::HookConfig;
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::hotkey::{Chord, Dispatcher, EventHandler, HotkeyId, Registry};
use crate::normalize::{NativeEvent, Normalizer};
use crate::platform;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Source of native input events.
///
/// `run` is called on the dedicated tap thread. It installs whatever the
/// platform needs, calls [`TapSink::ready`] once events can flow, then blocks
/// delivering events through [`TapSink::emit`] until `stop` is called or
/// [`TapSink::is_running`] turns false. Resources acquired by `run` must be
/// released before it returns, on every path.
///
/// Returning an error before `ready` fails `start`. Returning at any other
/// time while the session is still running counts as a runtime failure and
/// the tap is restarted with backoff.
pub trait Tap: Send + Sync + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Run the tap on the current thread.
    fn run(&self, sink: Arc<TapSink>) -> Result<()>;

    /// Ask a running tap to return from `run`. Called from a host thread.
    fn stop(&self);
}

/// Set while some [`SystemTap`] in the process is inside the OS event loop.
static OS_TAP_IN_USE: AtomicBool = AtomicBool::new(false);

/// The OS backend for the current platform.
///
/// The backends keep their state in process-wide slots, so only one
/// `SystemTap` can run at a time. Starting a second hook on the OS tap fails
/// with [`Error::AlreadyRunning`] until the first one ends.
#[derive(Debug, Default)]
pub struct SystemTap {
    owner: AtomicBool,
}

impl SystemTap {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self) -> Result<OsTapClaim<'_>> {
        OS_TAP_IN_USE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::AlreadyRunning)?;
        self.owner.store(true, Ordering::SeqCst);
        Ok(OsTapClaim { owner: &self.owner })
    }
}

/// Releases the process-wide OS tap on drop, unwinding included.
struct OsTapClaim<'a> {
    owner: &'a AtomicBool,
}

impl Drop for OsTapClaim<'_> {
    fn drop(&mut self) {
        self.owner.store(false, Ordering::SeqCst);
        OS_TAP_IN_USE.store(false, Ordering::SeqCst);
    }
}

impl Tap for SystemTap {
    fn name(&self) -> &'static str {
        platform::BACKEND
    }

    fn run(&self, sink: Arc<TapSink>) -> Result<()> {
        let _claim = self.claim()?;
        platform::run_tap(sink)
    }

    fn stop(&self) {
        // Another session may hold the OS loop; leave it alone.
        if self.owner.load(Ordering::SeqCst) {
            platform::stop_tap();
        }
    }
}

/// Where a tap delivers native events.
pub struct TapSink {
    normalizer: Mutex<Normalizer>,
    bus: EventBus,
    running: AtomicBool,
    ready: Mutex<Option<mpsc::Sender<Result<()>>>>,
}

impl TapSink {
    fn new(config: &HookConfig, bus: EventBus, ready: mpsc::Sender<Result<()>>) -> Self {
        Self {
            normalizer: Mutex::new(Normalizer::new(config)),
            bus,
            running: AtomicBool::new(true),
            ready: Mutex::new(Some(ready)),
        }
    }

    /// Normalize and publish one native event. Never blocks on consumers.
    pub fn emit(&self, native: NativeEvent) {
        if !self.is_running() {
            return;
        }
        let event = self
            .normalizer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .normalize(native);
        self.bus.publish(event);
    }

    /// Signal that the tap is installed. Only the first call has an effect.
    pub fn ready(&self) {
        if let Some(tx) = self.take_ready() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Whether the session still wants events.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Report a failure to a `start` that is still waiting. Returns `false`
    /// if the tap had already become ready.
    fn fail_start(&self, err: Error) -> bool {
        match self.take_ready() {
            Some(tx) => {
                let _ = tx.send(Err(err));
                true
            }
            None => false,
        }
    }

    fn take_ready(&self) -> Option<mpsc::Sender<Result<()>>> {
        self.ready.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn reset(&self) {
        self.normalizer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reset();
    }
}

impl fmt::Debug for TapSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapSink")
            .field("running", &self.is_running())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

/// Sleep for `delay`, waking early if the session stops.
fn pause(sink: &TapSink, delay: Duration) {
    let deadline = Instant::now() + delay;
    while sink.is_running() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(Duration::from_millis(10)));
    }
}

/// Body of the tap thread: run the tap, restarting it after runtime failures.
fn supervise(tap: &dyn Tap, sink: &Arc<TapSink>, config: &HookConfig) {
    let mut attempt = 0;
    loop {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| tap.run(sink.clone())))
            .unwrap_or_else(|payload| {
                Err(Error::Internal(format!(
                    "{} tap panicked: {}",
                    tap.name(),
                    panic_message(payload.as_ref())
                )))
            });

        if !sink.is_running() {
            if let Err(e) = outcome {
                log::debug!("{} tap returned after stop: {e}", tap.name());
            }
            break;
        }

        let err = outcome.err().unwrap_or_else(|| {
            Error::Internal(format!("{} tap exited unexpectedly", tap.name()))
        });
        if sink.fail_start(err.clone()) {
            return;
        }

        attempt += 1;
        if attempt > config.max_restarts {
            log::error!(
                "{} tap failed after {} restarts: {err}",
                tap.name(),
                config.max_restarts
            );
            sink.bus.close_with_error(err.to_string());
            return;
        }

        let delay = config.backoff_for(attempt);
        log::warn!(
            "{} tap failed: {err}; restart {attempt}/{} in {delay:?}",
            tap.name(),
            config.max_restarts
        );
        pause(sink, delay);
        if !sink.is_running() {
            break;
        }
        sink.reset();
    }
    log::debug!("{} tap thread finished", tap.name());
}

/// A named thread whose exit can be awaited with a timeout.
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

impl Worker {
    fn spawn<F>(name: &'static str, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, done) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                // Disconnects `done` when the thread exits, panics included.
                let _exit = tx;
                f();
            })
            .map_err(|e| Error::Internal(format!("failed to spawn {name} thread: {e}")))?;
        Ok(Self { name, handle, done })
    }

    fn join(self, timeout: Option<Duration>) {
        if let Some(timeout) = timeout
            && let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(timeout)
        {
            log::warn!(
                "{} thread did not exit within {timeout:?}, detaching it",
                self.name
            );
            return;
        }
        if self.handle.join().is_err() {
            log::error!("{} thread panicked", self.name);
        }
    }
}

/// Lifecycle states of a [`Hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// No session.
    Idle,
    /// `start` is installing the tap.
    Starting,
    /// Events are flowing.
    Running,
    /// `end` is tearing the session down.
    Stopping,
}

struct Session {
    bus: EventBus,
    stream: EventStream,
    sink: Arc<TapSink>,
    tap_worker: Worker,
    dispatch_worker: Worker,
}

impl Session {
    fn shutdown(self, tap: &dyn Tap, timeout: Option<Duration>) {
        self.sink.stop();
        tap.stop();
        self.tap_worker.join(timeout);
        self.bus.close();
        self.dispatch_worker.join(timeout);
        log::debug!(
            "session closed: {} events published, {} dropped",
            self.bus.published(),
            self.bus.dropped()
        );
    }
}

struct Lifecycle {
    state: HookState,
    session: Option<Session>,
}

/// Global keyboard and mouse hook.
///
/// Owns the hotkey registry and, between [`start`](Hook::start) and
/// [`end`](Hook::end), one session made of a tap thread and a dispatcher thread.
///
/// # Example
///
/// ```no_run
/// use keytap::{EventKind, Hook};
///
/// let hook = Hook::new();
/// hook.register(EventKind::KeyDown, &["ctrl", "f13"], |_: &keytap::Event| {
///     println!("ctrl+f13");
/// })?;
/// let stream = hook.start()?;
/// for event in stream.iter() {
///     println!("{event}");
/// }
/// # Ok::<(), keytap::Error>(())
/// ```
pub struct Hook {
    config: HookConfig,
    tap: Arc<dyn Tap>,
    registry: Registry,
    lifecycle: Mutex<Lifecycle>,
    settled: Condvar,
}

impl Default for Hook {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook {
    /// Create a hook for the current platform with default settings.
    pub fn new() -> Self {
        Self::with_config(HookConfig::default())
    }

    /// Create a hook for the current platform.
    pub fn with_config(config: HookConfig) -> Self {
        Self::with_tap(config, SystemTap::new())
    }

    /// Create a hook over a custom event source.
    pub fn with_tap<T: Tap>(config: HookConfig, tap: T) -> Self {
        Self {
            config,
            tap: Arc::new(tap),
            registry: Registry::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: HookState::Idle,
                session: None,
            }),
            settled: Condvar::new(),
        }
    }

    /// Start the session and return the raw event stream.
    ///
    /// Blocks until the tap is installed. If a session is already running,
    /// returns another handle to its stream.
    pub fn start(&self) -> Result<EventStream> {
        {
            let mut lifecycle = self.lock();
            match lifecycle.state {
                HookState::Running => {
                    if let Some(session) = &lifecycle.session {
                        return Ok(session.stream.clone());
                    }
                }
                HookState::Starting | HookState::Stopping => return Err(Error::AlreadyRunning),
                HookState::Idle => {}
            }
            lifecycle.state = HookState::Starting;
        }

        match self.launch() {
            Ok(session) => {
                let stream = session.stream.clone();
                let mut lifecycle = self.lock();
                lifecycle.session = Some(session);
                lifecycle.state = HookState::Running;
                drop(lifecycle);
                self.settled.notify_all();
                log::info!("{} hook started", self.tap.name());
                Ok(stream)
            }
            Err(e) => {
                self.lock().state = HookState::Idle;
                self.settled.notify_all();
                log::info!("{} hook failed to start: {e}", self.tap.name());
                Err(e)
            }
        }
    }

    fn launch(&self) -> Result<Session> {
        let bus = EventBus::new(self.config.bus_capacity);
        let stream = bus.subscribe();
        // Keys only: a burst of motion must not push a KeyUp out of this queue.
        let dispatch_stream = bus.subscribe_filtered(|e| e.kind.is_key());

        let (ready_tx, ready_rx) = mpsc::channel();
        let sink = Arc::new(TapSink::new(&self.config, bus.clone(), ready_tx));

        let tap_worker = {
            let tap = self.tap.clone();
            let sink = sink.clone();
            let config = self.config.clone();
            Worker::spawn("keytap-tap", move || supervise(tap.as_ref(), &sink, &config))?
        };

        let installed = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Internal("tap thread exited before starting".into())));
        if let Err(e) = installed {
            sink.stop();
            tap_worker.join(self.config.shutdown_timeout);
            bus.close();
            return Err(e);
        }

        let dispatcher = Dispatcher::new(self.registry.clone());
        let dispatch_worker =
            match Worker::spawn("keytap-dispatch", move || dispatcher.run(dispatch_stream)) {
                Ok(worker) => worker,
                Err(e) => {
                    sink.stop();
                    self.tap.stop();
                    tap_worker.join(self.config.shutdown_timeout);
                    bus.close();
                    return Err(e);
                }
            };

        Ok(Session {
            bus,
            stream,
            sink,
            tap_worker,
            dispatch_worker,
        })
    }

    /// End the session and remove every registered hotkey.
    ///
    /// Stops the tap, lets the dispatcher drain what is queued, closes the
    /// stream, and joins both threads. Safe to call when nothing is running.
    ///
    /// A `start` in progress on another thread is waited for and then torn
    /// down. While another `end` is already stopping the session this only
    /// clears the hotkeys.
    pub fn end(&self) -> Result<()> {
        let session = {
            let mut lifecycle = self.lock();
            while lifecycle.state == HookState::Starting {
                lifecycle = self
                    .settled
                    .wait(lifecycle)
                    .unwrap_or_else(|e| e.into_inner());
            }
            if lifecycle.state != HookState::Running {
                drop(lifecycle);
                self.registry.clear();
                return Ok(());
            }
            lifecycle.state = HookState::Stopping;
            lifecycle.session.take()
        };

        if let Some(session) = session {
            session.shutdown(self.tap.as_ref(), self.config.shutdown_timeout);
        }
        self.registry.clear();
        self.lock().state = HookState::Idle;
        self.settled.notify_all();
        log::info!("{} hook stopped", self.tap.name());
        Ok(())
    }

    /// Register `handler` for the chord named by `keys`.
    ///
    /// `keys` holds exactly one non-modifier name plus any of shift, ctrl, alt, meta.
    pub fn register<S, H>(&self, kind: EventKind, keys: &[S], handler: H) -> Result<HotkeyId>
    where
        S: AsRef<str>,
        H: EventHandler + 'static,
    {
        let chord = Chord::from_names(keys)?;
        self.registry.register(kind, chord, handler)
    }

    /// Register `handler` for a chord string such as `"ctrl+shift+f13"`.
    pub fn register_chord<H>(&self, kind: EventKind, chord: &str, handler: H) -> Result<HotkeyId>
    where
        H: EventHandler + 'static,
    {
        self.registry.register(kind, Chord::parse(chord)?, handler)
    }

    /// Remove a hotkey. Unknown ids are ignored.
    pub fn unregister(&self, id: HotkeyId) {
        self.registry.unregister(id);
    }

    /// The hotkey registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HookState {
        self.lock().state
    }

    /// Check if a session is running.
    pub fn is_running(&self) -> bool {
        self.state() == HookState::Running
    }

    /// Settings this hook was created with.
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("tap", &self.tap.name())
            .field("state", &self.state())
            .field("hotkeys", &self.registry.len())
            .finish()
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecvError;
    use crate::event::Event;
    use crate::keycode::code;
    use crate::state::MASK_CTRL;
    use std::sync::atomic::AtomicUsize;

    const WAIT: Duration = Duration::from_secs(2);

    /// Emits a fixed script, then blocks until stopped.
    ///
    /// While `held`, `run` waits before signalling ready.
    #[derive(Default)]
    struct ScriptedTap {
        script: Vec<NativeEvent>,
        stopped: Mutex<bool>,
        wake: Condvar,
        held: Mutex<bool>,
        gate: Condvar,
        runs: AtomicUsize,
        stops: AtomicUsize,
    }

    impl ScriptedTap {
        fn new(script: Vec<NativeEvent>) -> Self {
            Self {
                script,
                ..Self::default()
            }
        }

        fn held() -> Self {
            Self {
                held: Mutex::new(true),
                ..Self::default()
            }
        }

        fn release(&self) {
            *self.held.lock().unwrap() = false;
            self.gate.notify_all();
        }
    }

    impl Tap for Arc<ScriptedTap> {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn run(&self, sink: Arc<TapSink>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            *self.stopped.lock().unwrap() = false;
            let mut held = self.held.lock().unwrap();
            while *held {
                held = self.gate.wait(held).unwrap();
            }
            drop(held);
            sink.ready();
            for native in &self.script {
                sink.emit(*native);
            }
            let mut stopped = self.stopped.lock().unwrap();
            while !*stopped {
                stopped = self.wake.wait(stopped).unwrap();
            }
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            *self.stopped.lock().unwrap() = true;
            self.wake.notify_all();
        }
    }

    /// Fails every run, optionally after becoming ready.
    struct FailingTap {
        ready_first: bool,
        runs: Arc<AtomicUsize>,
    }

    impl Tap for FailingTap {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run(&self, sink: Arc<TapSink>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.ready_first {
                sink.ready();
                Err(Error::Internal("lost connection".into()))
            } else {
                Err(Error::Unsupported("no display".into()))
            }
        }

        fn stop(&self) {}
    }

    struct PanickingTap;

    impl Tap for PanickingTap {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn run(&self, _sink: Arc<TapSink>) -> Result<()> {
            panic!("tap exploded")
        }

        fn stop(&self) {}
    }

    fn fast_config() -> HookConfig {
        HookConfig::builder()
            .max_restarts(2)
            .restart_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    #[test]
    fn test_start_failure_leaves_idle() {
        let runs = Arc::new(AtomicUsize::new(0));
        let hook = Hook::with_tap(
            fast_config(),
            FailingTap {
                ready_first: false,
                runs: runs.clone(),
            },
        );
        let err = hook.start().unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(hook.state(), HookState::Idle);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_tap_fails_start() {
        let hook = Hook::with_tap(fast_config(), PanickingTap);
        match hook.start() {
            Err(Error::Internal(msg)) => assert!(msg.contains("tap exploded")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(hook.state(), HookState::Idle);
    }

    #[test]
    fn test_events_flow_and_hotkeys_fire() {
        let tap = Arc::new(ScriptedTap::new(vec![
            NativeEvent::key_press(code::CONTROL_LEFT, 0),
            NativeEvent::key_press(code::F13, 0),
            NativeEvent::key_release(code::F13, 0),
            NativeEvent::key_release(code::CONTROL_LEFT, 0),
        ]));
        let hook = Hook::with_tap(HookConfig::default(), tap.clone());

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        hook.register(EventKind::KeyDown, &["f13", "ctrl"], move |e: &Event| {
            sink.lock().unwrap().push(e.clone());
        })
        .unwrap();

        let stream = hook.start().unwrap();
        assert_eq!(hook.state(), HookState::Running);

        let kinds: Vec<EventKind> = (0..4)
            .map(|_| stream.recv_timeout(WAIT).unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::KeyDown,
                EventKind::KeyDown,
                EventKind::KeyUp,
                EventKind::KeyUp
            ]
        );

        hook.end().unwrap();
        assert_eq!(hook.state(), HookState::Idle);
        assert_eq!(tap.stops.load(Ordering::SeqCst), 1);
        assert_eq!(stream.recv_timeout(WAIT), Err(RecvError::Closed));

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rawcode, code::F13);
        assert_eq!(fired[0].mask, MASK_CTRL);
    }

    #[test]
    fn test_second_start_returns_existing_stream() {
        let tap = Arc::new(ScriptedTap::new(vec![NativeEvent::key_press(code::A, 0)]));
        let hook = Hook::with_tap(HookConfig::default(), tap.clone());

        let first = hook.start().unwrap();
        let second = hook.start().unwrap();
        assert_eq!(tap.runs.load(Ordering::SeqCst), 1);

        // Both handles read the same queue.
        assert_eq!(second.recv_timeout(WAIT).unwrap().rawcode, code::A);
        assert_eq!(first.try_recv(), Err(RecvError::Empty));
        hook.end().unwrap();
    }

    #[test]
    fn test_end_clears_patterns() {
        let hook = Hook::with_tap(HookConfig::default(), Arc::new(ScriptedTap::default()));
        hook.register_chord(EventKind::KeyDown, "alt+x", |_: &Event| {})
            .unwrap();
        assert_eq!(hook.registry().len(), 1);

        // Ending while idle still clears.
        hook.end().unwrap();
        assert!(hook.registry().is_empty());

        hook.register_chord(EventKind::KeyUp, "f1", |_: &Event| {})
            .unwrap();
        hook.start().unwrap();
        hook.end().unwrap();
        assert!(hook.registry().is_empty());
    }

    #[test]
    fn test_restart_after_end() {
        let tap = Arc::new(ScriptedTap::new(vec![NativeEvent::key_press(code::B, 0)]));
        let hook = Hook::with_tap(HookConfig::default(), tap.clone());

        for _ in 0..2 {
            let stream = hook.start().unwrap();
            let event = stream.recv_timeout(WAIT).unwrap();
            // Each session starts with a fresh normalizer.
            assert_eq!(event.kind, EventKind::KeyDown);
            hook.end().unwrap();
        }
        assert_eq!(tap.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_runtime_failure_closes_stream_with_error() {
        let runs = Arc::new(AtomicUsize::new(0));
        let hook = Hook::with_tap(
            fast_config(),
            FailingTap {
                ready_first: true,
                runs: runs.clone(),
            },
        );
        let stream = hook.start().unwrap();

        match stream.recv_timeout(WAIT) {
            Err(RecvError::Failed(msg)) => assert!(msg.contains("lost connection")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        hook.end().unwrap();
        assert_eq!(hook.state(), HookState::Idle);
    }

    #[test]
    fn test_invalid_registration_is_rejected() {
        let hook = Hook::with_tap(HookConfig::default(), Arc::new(ScriptedTap::default()));
        assert_eq!(
            hook.register(EventKind::KeyDown, &["ctrl", "bogus"], |_: &Event| {}),
            Err(Error::UnknownKey("bogus".into()))
        );
        assert!(matches!(
            hook.register_chord(EventKind::KeyDown, "a+b", |_: &Event| {}),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_drop_ends_session() {
        let tap = Arc::new(ScriptedTap::default());
        let stream = {
            let hook = Hook::with_tap(HookConfig::default(), tap.clone());
            hook.start().unwrap()
        };
        assert_eq!(tap.stops.load(Ordering::SeqCst), 1);
        assert_eq!(stream.recv_timeout(WAIT), Err(RecvError::Closed));
    }

    #[test]
    fn test_mouse_flood_does_not_stick_keys() {
        let mut script = vec![
            NativeEvent::key_press(code::F13, 0),
            NativeEvent::key_release(code::F13, 0),
        ];
        script.extend((0..1100).map(|i| NativeEvent::motion(i, i)));
        script.push(NativeEvent::key_press(code::F13, 0));
        let hook = Hook::with_tap(HookConfig::default(), Arc::new(ScriptedTap::new(script)));

        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        hook.register(EventKind::KeyDown, &["f13"], move |_: &Event| {
            thread::sleep(Duration::from_millis(150));
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let stream = hook.start().unwrap();
        let mut saw_motion = false;
        loop {
            let event = stream.recv_timeout(WAIT).unwrap();
            if event.kind == EventKind::MouseMove {
                saw_motion = true;
            } else if saw_motion && event.kind == EventKind::KeyDown {
                break;
            }
        }
        // End drains the dispatcher before returning.
        hook.end().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_end_waits_for_pending_start() {
        let tap = Arc::new(ScriptedTap::held());
        let hook = Arc::new(Hook::with_tap(HookConfig::default(), tap.clone()));

        let starter = {
            let hook = hook.clone();
            thread::spawn(move || hook.start())
        };
        let deadline = Instant::now() + WAIT;
        while hook.state() != HookState::Starting {
            assert!(Instant::now() < deadline, "start never began");
            thread::sleep(Duration::from_millis(1));
        }

        let ender = {
            let hook = hook.clone();
            thread::spawn(move || hook.end())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!ender.is_finished());

        tap.release();
        let stream = starter.join().unwrap().unwrap();
        ender.join().unwrap().unwrap();

        assert_eq!(hook.state(), HookState::Idle);
        assert_eq!(tap.stops.load(Ordering::SeqCst), 1);
        assert_eq!(stream.recv_timeout(WAIT), Err(RecvError::Closed));
    }

    /// Serializes tests that touch the process-wide OS tap.
    static SYSTEM_TAP: Mutex<()> = Mutex::new(());

    #[test]
    fn test_system_tap_is_exclusive() {
        let _serial = SYSTEM_TAP.lock().unwrap_or_else(|e| e.into_inner());

        let holder = SystemTap::new();
        let claim = holder.claim().unwrap();

        let hook = Hook::new();
        assert_eq!(hook.start().unwrap_err(), Error::AlreadyRunning);
        assert_eq!(hook.state(), HookState::Idle);
        assert!(matches!(
            SystemTap::new().claim(),
            Err(Error::AlreadyRunning)
        ));

        drop(claim);
        assert!(!holder.owner.load(Ordering::SeqCst));
        let other = SystemTap::new();
        let reclaimed = other.claim();
        assert!(reclaimed.is_ok());
    }

    #[cfg(all(target_os = "linux", not(feature = "x11")))]
    #[test]
    fn test_start_without_backend_is_unsupported() {
        let _serial = SYSTEM_TAP.lock().unwrap_or_else(|e| e.into_inner());

        let hook = Hook::new();
        assert!(matches!(hook.start(), Err(Error::Unsupported(_))));
        assert_eq!(hook.state(), HookState::Idle);
        assert!(!OS_TAP_IN_USE.load(Ordering::SeqCst));
    }
}
