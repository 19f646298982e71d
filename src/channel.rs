//! Bounded, lossy event bus from the tap thread to any number of consumers.
//!
//! Every subscriber owns a queue of fixed capacity. Publishing never blocks:
//! when a queue is full its oldest event is discarded and the drop counters
//! are bumped. Consumers see events in production order. Closing the bus lets
//! consumers drain what is queued before they observe the close.
//!
//! # Example
//!
//! ```no_run
//! use keytap::Hook;
//! use std::time::Duration;
//!
//! let hook = Hook::new();
//! let stream = hook.start().expect("Failed to start hook");
//!
//! loop {
//!     match stream.recv_timeout(Duration::from_millis(100)) {
//!         Ok(event) => println!("{event}"),
//!         Err(keytap::RecvError::Timeout) => continue,
//!         Err(_) => break,
//!     }
//! }
//! ```

use crate::event::Event;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a receive returned no event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecvError {
    /// Nothing queued (`try_recv` only).
    #[error("no event available")]
    Empty,
    /// Nothing arrived in time (`recv_timeout` only).
    #[error("timed out waiting for an event")]
    Timeout,
    /// The bus was closed and the queue is drained.
    #[error("event stream closed")]
    Closed,
    /// The tap failed permanently; the queue is drained.
    #[error("event stream failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
enum CloseReason {
    Ended,
    Failed(String),
}

impl CloseReason {
    fn to_error(&self) -> RecvError {
        match self {
            CloseReason::Ended => RecvError::Closed,
            CloseReason::Failed(msg) => RecvError::Failed(msg.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct Queue {
    events: VecDeque<Event>,
    closed: Option<CloseReason>,
}

#[derive(Debug)]
struct Subscription {
    capacity: usize,
    filter: Option<fn(&Event) -> bool>,
    queue: Mutex<Queue>,
    available: Condvar,
    dropped: AtomicU64,
}

impl Subscription {
    fn accepts(&self, event: &Event) -> bool {
        self.filter.is_none_or(|f| f(event))
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        // The queue holds plain data, so a poisoned lock is still consistent.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push, discarding the oldest event on overflow. Returns whether one was discarded.
    fn push(&self, event: Event) -> bool {
        let mut queue = self.lock();
        if queue.closed.is_some() {
            return false;
        }
        let overflowed = queue.events.len() >= self.capacity;
        if overflowed {
            queue.events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.events.push_back(event);
        drop(queue);
        self.available.notify_all();
        overflowed
    }

    fn close(&self, reason: CloseReason) {
        let mut queue = self.lock();
        if queue.closed.is_none() {
            queue.closed = Some(reason);
        }
        drop(queue);
        self.available.notify_all();
    }
}

#[derive(Debug)]
struct BusShared {
    capacity: usize,
    subscribers: Mutex<Vec<Weak<Subscription>>>,
    closed: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Producer side of the bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(BusShared {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Add a consumer. It only sees events published after this call.
    pub fn subscribe(&self) -> EventStream {
        self.attach(None)
    }

    /// Add a consumer that only queues events `filter` accepts.
    ///
    /// Rejected events never take up room in its queue, so a flood of them
    /// cannot push out the ones it cares about.
    pub fn subscribe_filtered(&self, filter: fn(&Event) -> bool) -> EventStream {
        self.attach(Some(filter))
    }

    fn attach(&self, filter: Option<fn(&Event) -> bool>) -> EventStream {
        let sub = Arc::new(Subscription {
            capacity: self.shared.capacity,
            filter,
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
            dropped: AtomicU64::new(0),
        });
        if self.is_closed() {
            sub.close(CloseReason::Ended);
        }
        self.subscribers().push(Arc::downgrade(&sub));
        EventStream { sub }
    }

    /// Deliver `event` to every live subscriber without blocking on consumers.
    pub fn publish(&self, event: Event) {
        if self.is_closed() {
            return;
        }
        self.shared.published.fetch_add(1, Ordering::Relaxed);

        let live: Vec<Arc<Subscription>> = {
            let mut subs = self.subscribers();
            subs.retain(|weak| weak.strong_count() > 0);
            subs.iter()
                .filter_map(Weak::upgrade)
                .filter(|sub| sub.accepts(&event))
                .collect()
        };

        if let Some((last, rest)) = live.split_last() {
            for sub in rest {
                if sub.push(event.clone()) {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            if last.push(event) {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Close the bus; consumers drain and then see [`RecvError::Closed`].
    pub fn close(&self) {
        self.close_with(CloseReason::Ended);
    }

    /// Close the bus with an error sentinel; consumers drain and then see
    /// [`RecvError::Failed`].
    pub fn close_with_error(&self, message: impl Into<String>) {
        self.close_with(CloseReason::Failed(message.into()));
    }

    fn close_with(&self, reason: CloseReason) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subs: Vec<_> = self.subscribers().iter().filter_map(Weak::upgrade).collect();
        for sub in subs {
            sub.close(reason.clone());
        }
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Events discarded across all subscribers.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Events accepted by [`publish`](Self::publish).
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers();
        subs.retain(|weak| weak.strong_count() > 0);
        subs.len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Weak<Subscription>>> {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Consumer side of the bus.
///
/// Clones share one queue: each event goes to exactly one of the clones.
#[derive(Debug, Clone)]
pub struct EventStream {
    sub: Arc<Subscription>,
}

impl EventStream {
    /// Block until an event arrives or the bus is closed and drained.
    pub fn recv(&self) -> Result<Event, RecvError> {
        let mut queue = self.sub.lock();
        loop {
            if let Some(event) = queue.events.pop_front() {
                return Ok(event);
            }
            if let Some(reason) = &queue.closed {
                return Err(reason.to_error());
            }
            queue = self
                .sub
                .available
                .wait(queue)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.sub.lock();
        loop {
            if let Some(event) = queue.events.pop_front() {
                return Ok(event);
            }
            if let Some(reason) = &queue.closed {
                return Err(reason.to_error());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RecvError::Timeout);
            }
            queue = self
                .sub
                .available
                .wait_timeout(queue, remaining)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Take an event if one is queued.
    pub fn try_recv(&self) -> Result<Event, RecvError> {
        let mut queue = self.sub.lock();
        match queue.events.pop_front() {
            Some(event) => Ok(event),
            None => Err(queue
                .closed
                .as_ref()
                .map_or(RecvError::Empty, CloseReason::to_error)),
        }
    }

    /// Blocking iterator that ends when the bus closes.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        std::iter::from_fn(move || self.recv().ok())
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.sub.lock().events.len()
    }

    /// Whether no events are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events this consumer lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.sub.dropped.load(Ordering::Relaxed)
    }

    /// Whether the bus has closed (events may still be queued).
    pub fn is_closed(&self) -> bool {
        self.sub.lock().closed.is_some()
    }
}

// ============================================================================
// Tokio async support (behind feature flag)
// ============================================================================

#[cfg(feature = "tokio")]
mod tokio_bridge {
    use super::*;
    use tokio::sync::mpsc as tokio_mpsc;

    impl EventStream {
        /// Forward this stream into a tokio channel.
        ///
        /// A helper thread moves events across; it exits when the bus closes or
        /// the receiver is dropped. Loss only happens on the bus side.
        ///
        /// ```ignore
        /// let stream = keytap::start()?;
        /// let mut rx = stream.into_async(256);
        /// while let Some(event) = rx.recv().await {
        ///     println!("{event}");
        /// }
        /// ```
        pub fn into_async(self, capacity: usize) -> tokio_mpsc::Receiver<Event> {
            let (sender, receiver) = tokio_mpsc::channel(capacity.max(1));
            let spawned = std::thread::Builder::new()
                .name("keytap-async-bridge".into())
                .spawn(move || {
                    while let Ok(event) = self.recv() {
                        if sender.blocking_send(event).is_err() {
                            break;
                        }
                    }
                });
            if let Err(e) = spawned {
                log::error!("failed to spawn async bridge: {e}");
            }
            receiver
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::keycode::code;
    use std::thread;

    fn key(raw: u16) -> Event {
        Event::key(EventKind::KeyDown, raw)
    }

    #[test]
    fn test_events_delivered_in_order() {
        let bus = EventBus::new(8);
        let stream = bus.subscribe();
        for raw in [code::A, code::B, code::C] {
            bus.publish(key(raw));
        }
        let got: Vec<u16> = (0..3).map(|_| stream.recv().unwrap().rawcode).collect();
        assert_eq!(got, vec![code::A, code::B, code::C]);
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new(8);
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(key(code::F13));
        assert_eq!(a.recv().unwrap().rawcode, code::F13);
        assert_eq!(b.recv().unwrap().rawcode, code::F13);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let bus = EventBus::new(1024);
        let stream = bus.subscribe();
        for i in 0..10_000u32 {
            let mut event = key(code::A);
            event.native = i;
            bus.publish(event);
        }

        assert_eq!(bus.dropped(), 10_000 - 1024);
        assert_eq!(stream.dropped(), 10_000 - 1024);
        assert_eq!(bus.published(), 10_000);

        bus.close();
        let drained: Vec<u32> = stream.iter().map(|e| e.native).collect();
        assert_eq!(drained.len(), 1024);
        let expected: Vec<u32> = (10_000 - 1024..10_000).collect();
        assert_eq!(drained, expected);
    }

    #[test]
    fn test_slow_consumer_sees_newest_events() {
        let bus = EventBus::new(1024);
        let stream = bus.subscribe();
        let producer = {
            let bus = bus.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    let mut event = key(code::A);
                    event.native = i;
                    bus.publish(event);
                }
                bus.close();
            })
        };
        producer.join().unwrap();

        let mut last = None;
        let mut seen = 0u64;
        for event in stream.iter() {
            if let Some(prev) = last {
                assert!(event.native > prev);
            }
            last = Some(event.native);
            seen += 1;
        }
        assert_eq!(seen + stream.dropped(), 10_000);
        assert_eq!(last, Some(9_999));
    }

    #[test]
    fn test_close_drains_then_reports() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe();
        bus.publish(key(code::A));
        bus.close();
        bus.publish(key(code::B));

        assert!(stream.is_closed());
        assert_eq!(stream.recv().unwrap().rawcode, code::A);
        assert_eq!(stream.recv(), Err(RecvError::Closed));
        assert_eq!(stream.try_recv(), Err(RecvError::Closed));
    }

    #[test]
    fn test_close_with_error_sentinel() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe();
        bus.close_with_error("x record read failed");
        assert_eq!(
            stream.recv(),
            Err(RecvError::Failed("x record read failed".into()))
        );
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe();
        let consumer = thread::spawn(move || stream.recv());
        thread::sleep(Duration::from_millis(20));
        bus.close();
        assert_eq!(consumer.join().unwrap(), Err(RecvError::Closed));
    }

    #[test]
    fn test_try_recv_and_timeout() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe();
        assert_eq!(stream.try_recv(), Err(RecvError::Empty));
        assert_eq!(
            stream.recv_timeout(Duration::from_millis(10)),
            Err(RecvError::Timeout)
        );
        bus.publish(key(code::A));
        assert_eq!(stream.len(), 1);
        assert!(stream.recv_timeout(Duration::from_millis(10)).is_ok());
        assert!(stream.is_empty());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe();
        drop(bus.subscribe());
        bus.publish(key(code::A));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_subscribe_after_close_is_closed() {
        let bus = EventBus::new(4);
        bus.close();
        assert_eq!(bus.subscribe().recv(), Err(RecvError::Closed));
    }

    #[test]
    fn test_filtered_subscriber_skips_rejected_events() {
        let bus = EventBus::new(4);
        let all = bus.subscribe();
        let keys = bus.subscribe_filtered(|e| e.kind.is_key());

        bus.publish(key(code::A));
        for i in 0..10 {
            bus.publish(Event::mouse(EventKind::MouseMove, 0, i, i));
        }
        bus.publish(Event::key(EventKind::KeyUp, code::A));
        bus.close();

        let kinds: Vec<EventKind> = keys.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::KeyDown, EventKind::KeyUp]);
        assert_eq!(keys.dropped(), 0);

        assert_eq!(all.iter().count(), 4);
        assert_eq!(all.dropped(), 8);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_into_async_forwards_until_close() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe().into_async(4);
        bus.publish(key(code::A));
        bus.publish(key(code::B));
        bus.close();

        assert_eq!(rx.recv().await.map(|e| e.rawcode), Some(code::A));
        assert_eq!(rx.recv().await.map(|e| e.rawcode), Some(code::B));
        assert!(rx.recv().await.is_none());
    }
}
