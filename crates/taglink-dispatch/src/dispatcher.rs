//! The tag dispatcher: a routing table plus a staged delivery queue.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use taglink_wire::{Message, Tag};

/// Counter for generating unique callback ids.
static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying one registered callback.
///
/// Returned by [`Dispatcher::register`]; pass it back to
/// [`Dispatcher::unregister`] to remove exactly that callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

/// One staged delivery: the tag it arrived under and the message itself.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    /// The routing tag.
    pub tag: Tag,
    /// The received message, read cursor at the payload start.
    pub message: Message,
}

impl DispatchEvent {
    /// Builds an event from a received message, keyed by its own tag.
    pub fn from_message(message: Message) -> Self {
        Self {
            tag: message.tag(),
            message,
        }
    }
}

type Callback = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    routes: HashMap<Tag, Vec<(CallbackId, Callback)>>,
    queue: VecDeque<DispatchEvent>,
}

/// Routes staged messages to the callbacks registered for their tag.
///
/// Arrival and delivery are decoupled: a receive loop calls
/// [`stage`](Self::stage) as datagrams come in, and the embedder drains
/// **one** event per [`tick`](Self::tick) from its own schedule. That keeps
/// callback cost off the network thread and gives the embedder a natural
/// throttle.
///
/// Every operation takes the internal mutex, so the dispatcher can be
/// shared freely between the receive loop and the embedder's loop.
#[derive(Default)]
pub struct Dispatcher {
    inner: Mutex<Inner>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for a tag, creating the route if absent.
    /// Callbacks fire in registration order.
    pub fn register<F>(&self, tag: impl Into<Tag>, callback: F) -> CallbackId
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        let id = CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.lock().expect("dispatcher lock");
        inner
            .routes
            .entry(tag.into())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes one callback from a tag's route. Returns whether it was
    /// present.
    pub fn unregister(&self, tag: impl Into<Tag>, id: CallbackId) -> bool {
        let tag = tag.into();
        let mut inner = self.inner.lock().expect("dispatcher lock");
        let Some(callbacks) = inner.routes.get_mut(&tag) else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            inner.routes.remove(&tag);
        }
        removed
    }

    /// Removes a tag's route entirely. Returns whether it existed.
    pub fn unregister_tag(&self, tag: impl Into<Tag>) -> bool {
        let mut inner = self.inner.lock().expect("dispatcher lock");
        inner.routes.remove(&tag.into()).is_some()
    }

    /// Empties the routing table. Staged events are kept: they will simply
    /// find no subscribers when drained.
    pub fn clear(&self) {
        self.inner.lock().expect("dispatcher lock").routes.clear();
    }

    /// Enqueues an event for a later [`tick`](Self::tick).
    pub fn stage(&self, event: DispatchEvent) {
        self.inner.lock().expect("dispatcher lock").queue.push_back(event);
    }

    /// Drains one staged event, invoking every callback registered for its
    /// tag in registration order. Returns whether an event was delivered.
    ///
    /// Callbacks run outside the lock on a snapshot of the route, so a
    /// callback may freely re-enter the dispatcher. A panicking callback
    /// is caught and logged; the remaining callbacks still run.
    pub fn tick(&self) -> bool {
        let (event, callbacks) = {
            let mut inner = self.inner.lock().expect("dispatcher lock");
            let Some(event) = inner.queue.pop_front() else {
                return false;
            };
            let callbacks: Vec<Callback> = inner
                .routes
                .get(&event.tag)
                .map(|route| route.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default();
            (event, callbacks)
        };

        if callbacks.is_empty() {
            tracing::debug!(tag = %event.tag, "no subscribers, event dropped");
            return true;
        }

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                tracing::warn!(tag = %event.tag, "subscriber panicked, continuing");
            }
        }
        true
    }

    /// Events waiting to be drained.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().expect("dispatcher lock").queue.len()
    }

    /// Callbacks currently registered for a tag.
    pub fn callback_count(&self, tag: impl Into<Tag>) -> usize {
        self.inner
            .lock()
            .expect("dispatcher lock")
            .routes
            .get(&tag.into())
            .map_or(0, Vec::len)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event(tag: u16) -> DispatchEvent {
        DispatchEvent::from_message(incoming(tag))
    }

    fn incoming(tag: u16) -> Message {
        let out = Message::outgoing(tag);
        Message::incoming(out.bytes().to_vec()).expect("framed header")
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&DispatchEvent) + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        (count, move |_: &DispatchEvent| {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_tick_invokes_every_callback_once() {
        let dispatcher = Dispatcher::new();
        let (c1, f1) = counter();
        let (c2, f2) = counter();
        let (c3, f3) = counter();
        dispatcher.register(7u16, f1);
        dispatcher.register(7u16, f2);
        dispatcher.register(7u16, f3);

        dispatcher.stage(event(7));
        assert!(dispatcher.tick());

        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.queue_len(), 0);
    }

    #[test]
    fn test_tick_drains_exactly_one_event() {
        let dispatcher = Dispatcher::new();
        let (count, f) = counter();
        dispatcher.register(5u16, f);

        for _ in 0..4 {
            dispatcher.stage(event(5));
        }
        // k ticks deliver min(k, staged) events.
        dispatcher.tick();
        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.queue_len(), 2);

        for _ in 0..10 {
            dispatcher.tick();
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert!(!dispatcher.tick());
    }

    #[test]
    fn test_callbacks_fire_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            dispatcher.register(1u16, move |_| {
                order.lock().unwrap().push(label);
            });
        }

        dispatcher.stage(event(1));
        dispatcher.tick();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unregistered_callback_stops_firing() {
        let dispatcher = Dispatcher::new();
        let (kept_count, kept) = counter();
        let (gone_count, gone) = counter();
        dispatcher.register(2u16, kept);
        let id = dispatcher.register(2u16, gone);

        assert!(dispatcher.unregister(2u16, id));
        dispatcher.stage(event(2));
        dispatcher.tick();

        assert_eq!(kept_count.load(Ordering::SeqCst), 1);
        assert_eq!(gone_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_unknown_id_returns_false() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.register(1u16, |_| {});
        assert!(!dispatcher.unregister(9u16, id));
        assert!(dispatcher.unregister(1u16, id));
        assert!(!dispatcher.unregister(1u16, id));
    }

    #[test]
    fn test_unregister_tag_removes_route() {
        let dispatcher = Dispatcher::new();
        let (count, f) = counter();
        dispatcher.register(3u16, f);

        assert!(dispatcher.unregister_tag(3u16));
        assert!(!dispatcher.unregister_tag(3u16));

        dispatcher.stage(event(3));
        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_leaves_queue_untouched() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(4u16, |_| {});
        dispatcher.stage(event(4));
        dispatcher.stage(event(4));

        dispatcher.clear();
        assert_eq!(dispatcher.callback_count(4u16), 0);
        assert_eq!(dispatcher.queue_len(), 2);
    }

    #[test]
    fn test_event_with_no_subscribers_is_dropped() {
        let dispatcher = Dispatcher::new();
        dispatcher.stage(event(99));
        assert!(dispatcher.tick());
        assert_eq!(dispatcher.queue_len(), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_starve_siblings() {
        let dispatcher = Dispatcher::new();
        let (before_count, before) = counter();
        let (after_count, after) = counter();
        dispatcher.register(6u16, before);
        dispatcher.register(6u16, |_| panic!("subscriber bug"));
        dispatcher.register(6u16, after);

        dispatcher.stage(event(6));
        dispatcher.tick();

        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delivery_preserves_enqueue_order_within_tag() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&seen);
        dispatcher.register(8u16, move |evt| {
            clone.lock().unwrap().push(evt.message.sender_id());
        });

        for id in [10i16, 20, 30] {
            let mut out = Message::outgoing(8u16);
            out.stamp_sender(id);
            dispatcher.stage(DispatchEvent::from_message(
                Message::incoming(out.bytes().to_vec()).unwrap(),
            ));
        }
        while dispatcher.tick() {}
        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_callback_may_reenter_dispatcher() {
        let dispatcher = Arc::new(Dispatcher::new());
        let clone = Arc::clone(&dispatcher);
        let (count, f) = counter();
        dispatcher.register(11u16, f);
        dispatcher.register(10u16, move |_| {
            clone.stage(event(11));
        });

        dispatcher.stage(event(10));
        dispatcher.tick();
        dispatcher.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
