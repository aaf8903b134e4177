//! A multicast callback set for lifecycle events.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Counter for generating unique hook ids.
static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying one connected hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook-{}", self.0)
    }
}

type Hook<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// An ordered set of callbacks all invoked for every emitted event.
///
/// This is the crate's stand-in for multicast event delegates: sources own
/// a `Signal` per event kind, embedders connect as many hooks as they
/// like, and [`emit`](Self::emit) iterates a snapshot taken under the
/// lock — so a hook may connect or disconnect hooks (even itself) without
/// deadlocking. A panicking hook is caught and logged; the rest still run.
pub struct Signal<E> {
    hooks: Mutex<Vec<(HookId, Hook<E>)>>,
}

impl<E> Signal<E> {
    /// Creates a signal with no hooks.
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Connects a hook; it fires on every subsequent emit, in connection
    /// order.
    pub fn connect<F>(&self, hook: F) -> HookId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed));
        self.hooks
            .lock()
            .expect("signal lock")
            .push((id, Arc::new(hook)));
        id
    }

    /// Disconnects a hook. Returns whether it was connected.
    pub fn disconnect(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock().expect("signal lock");
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    /// Invokes every connected hook with the event.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Hook<E>> = {
            let hooks = self.hooks.lock().expect("signal lock");
            hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect()
        };
        for hook in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(event))).is_err() {
                tracing::warn!("event hook panicked, continuing");
            }
        }
    }

    /// Number of connected hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().expect("signal lock").len()
    }

    /// Whether no hooks are connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("hooks", &self.len()).finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_every_hook() {
        let signal: Signal<u32> = Signal::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            signal.connect(move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }
        signal.emit(&5);
        assert_eq!(total.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_disconnected_hook_stops_firing() {
        let signal: Signal<()> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        let id = signal.connect(move |()| {
            clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&());
        assert!(signal.disconnect(id));
        signal.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!signal.disconnect(id));
    }

    #[test]
    fn test_hooks_fire_in_connection_order() {
        let signal: Signal<()> = Signal::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            signal.connect(move |()| order.lock().unwrap().push(label));
        }
        signal.emit(&());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_panicking_hook_does_not_starve_siblings() {
        let signal: Signal<()> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        signal.connect(|()| panic!("hook bug"));
        let clone = Arc::clone(&count);
        signal.connect(move |()| {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        signal.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_may_disconnect_itself() {
        let signal: Signal<()> = Signal::new();
        let slot: Arc<Mutex<Option<HookId>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let slot_clone = Arc::clone(&slot);
        let count_clone = Arc::clone(&count);
        let signal = Arc::new(signal);
        let signal_clone = Arc::clone(&signal);
        let id = signal.connect(move |()| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot_clone.lock().unwrap() {
                signal_clone.disconnect(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        signal.emit(&());
        signal.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
