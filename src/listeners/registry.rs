//! # Tiered listener registry.
//!
//! Listeners are keyed by identity (the address of their allocation), so the
//! same listener can never sit in two tiers or twice in one tier.
//!
//! ## Rules
//! - Notification iterates a **snapshot**: listeners may add or remove
//!   listeners from inside `cluster_changed`.
//! - Within a tier listeners run in registration order.
//! - A panicking listener is logged and reported; the rest still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::listeners::{ClusterStateListener, ListenerTier};
use crate::state::ClusterChangedEvent;
use crate::subscribers::panic_message;

/// Identity of a listener allocation, independent of the trait object it is viewed through.
pub(crate) fn listener_key<L: ?Sized>(listener: &Arc<L>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// Runs one listener callback, reporting a panic on `bus` instead of unwinding
/// into the caller. Returns `false` if the callback panicked.
pub(crate) fn isolated(bus: &Bus, source: &str, callback: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(panic_err) => {
            let info = panic_message(&*panic_err);
            warn!(source, callback, "listener callback panicked: {info}");
            bus.publish(
                Event::new(EventKind::ListenerPanicked)
                    .with_source(source)
                    .with_reason(format!("{callback}: {info}")),
            );
            false
        }
    }
}

struct Entry {
    key: usize,
    tier: ListenerTier,
    listener: Arc<dyn ClusterStateListener>,
}

/// Tiered set of [`ClusterStateListener`]s.
pub struct ListenerRegistry {
    entries: RwLock<Vec<Entry>>,
    bus: Bus,
}

impl ListenerRegistry {
    /// Creates an empty registry reporting panics on `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Registers `listener` in `tier`.
    ///
    /// Returns `false` if the same listener is already registered in any tier.
    pub fn add(&self, tier: ListenerTier, listener: Arc<dyn ClusterStateListener>) -> bool {
        let key = listener_key(&listener);
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.key == key) {
            return false;
        }
        entries.push(Entry {
            key,
            tier,
            listener,
        });
        true
    }

    /// Removes the listener with identity `key` from whichever tier holds it.
    pub(crate) fn remove_key(&self, key: usize) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.key != key);
        entries.len() != before
    }

    /// Removes `listener`; returns `false` if it was not registered.
    pub fn remove<L: ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.remove_key(listener_key(listener))
    }

    /// Tier holding `listener`, if registered.
    pub fn tier_of<L: ?Sized>(&self, listener: &Arc<L>) -> Option<ListenerTier> {
        let key = listener_key(listener);
        self.entries
            .read()
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.tier)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self, tier: ListenerTier) -> Vec<Arc<dyn ClusterStateListener>> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.tier == tier)
            .map(|e| Arc::clone(&e.listener))
            .collect()
    }

    /// Notifies every listener of `tier`, isolating panics.
    pub fn notify(&self, tier: ListenerTier, event: &ClusterChangedEvent) {
        for listener in self.snapshot(tier) {
            let res = catch_unwind(AssertUnwindSafe(|| listener.cluster_changed(event)));
            if let Err(panic_err) = res {
                let info = panic_message(&*panic_err);
                warn!(
                    tier = tier.as_label(),
                    source = event.source(),
                    "failed to notify ClusterStateListener: {info}"
                );
                self.bus.publish(
                    Event::new(EventKind::ListenerPanicked)
                        .with_source(event.source())
                        .with_version(event.state().version())
                        .with_reason(info),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ClusterState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl ClusterStateListener for Counting {
        fn cluster_changed(&self, _event: &ClusterChangedEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Boom;

    impl ClusterStateListener for Boom {
        fn cluster_changed(&self, _event: &ClusterChangedEvent) {
            panic!("listener boom");
        }
    }

    fn event() -> ClusterChangedEvent {
        let prev = ClusterState::builder("test").build();
        let next = ClusterState::builder_from(&prev).increment_version().build();
        ClusterChangedEvent::new("test", next, prev)
    }

    #[test]
    fn test_listener_lives_in_one_tier() {
        let reg = ListenerRegistry::new(Bus::new(4));
        let l = Arc::new(Counting(AtomicUsize::new(0)));

        assert!(reg.add(ListenerTier::First, l.clone()));
        assert!(!reg.add(ListenerTier::Last, l.clone()));
        assert!(!reg.add(ListenerTier::First, l.clone()));
        assert_eq!(reg.tier_of(&l), Some(ListenerTier::First));
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(&l));
        assert!(!reg.remove(&l));
        assert!(reg.add(ListenerTier::Last, l.clone()));
        assert_eq!(reg.tier_of(&l), Some(ListenerTier::Last));
    }

    #[test]
    fn test_notify_only_hits_requested_tier() {
        let reg = ListenerRegistry::new(Bus::new(4));
        let first = Arc::new(Counting(AtomicUsize::new(0)));
        let post = Arc::new(Counting(AtomicUsize::new(0)));
        reg.add(ListenerTier::First, first.clone());
        reg.add(ListenerTier::PostApplied, post.clone());

        reg.notify(ListenerTier::First, &event());
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(post.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let reg = ListenerRegistry::new(bus);
        let after = Arc::new(Counting(AtomicUsize::new(0)));
        reg.add(ListenerTier::Normal, Arc::new(Boom));
        reg.add(ListenerTier::Normal, after.clone());

        reg.notify(ListenerTier::Normal, &event());

        assert_eq!(after.0.load(Ordering::SeqCst), 1);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::ListenerPanicked);
        assert_eq!(ev.reason.as_deref(), Some("listener boom"));
    }

    #[test]
    fn test_isolated_reports_callback_panic() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();

        assert!(isolated(&bus, "ok", "on_failure", || {}));
        assert!(!isolated(&bus, "bad", "cluster_state_processed", || panic!("task listener boom")));

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::ListenerPanicked);
        assert_eq!(ev.source.as_deref(), Some("bad"));
        assert_eq!(ev.reason.as_deref(), Some("cluster_state_processed: task listener boom"));
        assert!(rx.try_recv().is_err());
    }
}
