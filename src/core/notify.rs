//! # Registration timeouts of timeout listeners.
//!
//! A [`NotifyTimeouts`] entry is armed when a timeout listener is registered
//! with a timeout. When it elapses the listener hears `on_timeout` (or
//! `on_close` if the service stopped meanwhile). Removing the listener or
//! stopping the service cancels it.
//!
//! The timer, `cancel_for` and `close_all` all race for the entry's claim;
//! only the winner talks to the listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::lifecycle::Lifecycle;
use crate::events::Bus;
use crate::listeners::{TimeoutClusterStateListener, isolated, listener_key};

const SOURCE: &str = "_notify_timeout_";

struct NotifyTimeout {
    key: usize,
    listener: Arc<dyn TimeoutClusterStateListener>,
    token: CancellationToken,
    done: AtomicBool,
}

impl NotifyTimeout {
    /// `true` only for the first caller; cancels the timer.
    fn claim(&self) -> bool {
        let won = !self.done.swap(true, Ordering::AcqRel);
        if won {
            self.token.cancel();
        }
        won
    }
}

pub(crate) struct NotifyTimeouts {
    entries: Mutex<Vec<Arc<NotifyTimeout>>>,
    bus: Bus,
}

impl NotifyTimeouts {
    pub(crate) fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            bus,
        })
    }

    /// Arms a timeout for `listener`.
    pub(crate) fn register(
        self: &Arc<Self>,
        listener: Arc<dyn TimeoutClusterStateListener>,
        timeout: Duration,
        lifecycle: Arc<Lifecycle>,
    ) {
        let entry = Arc::new(NotifyTimeout {
            key: listener_key(&listener),
            listener,
            token: CancellationToken::new(),
            done: AtomicBool::new(false),
        });
        self.entries.lock().push(Arc::clone(&entry));

        let registry = Arc::downgrade(self);
        let bus = self.bus.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = entry.token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if !entry.claim() {
                        return;
                    }
                    if let Some(registry) = registry.upgrade() {
                        registry.entries.lock().retain(|e| !Arc::ptr_eq(e, &entry));
                    }
                    if lifecycle.stopped_or_closed() {
                        isolated(&bus, SOURCE, "on_close", || entry.listener.on_close());
                    } else {
                        isolated(&bus, SOURCE, "on_timeout", || entry.listener.on_timeout(timeout));
                    }
                }
            }
        });
    }

    /// Cancels every timeout armed for the listener with identity `key`.
    pub(crate) fn cancel_for(&self, key: usize) {
        self.entries.lock().retain(|e| {
            if e.key == key {
                e.claim();
                false
            } else {
                true
            }
        });
    }

    /// Cancels everything and tells the affected listeners the service closed.
    pub(crate) fn close_all(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        for e in entries {
            if e.claim() {
                isolated(&self.bus, SOURCE, "on_close", || e.listener.on_close());
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::ClusterStateListener;
    use crate::state::ClusterChangedEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Waiter {
        timeouts: AtomicUsize,
        closes: AtomicUsize,
    }

    impl ClusterStateListener for Waiter {
        fn cluster_changed(&self, _event: &ClusterChangedEvent) {}
    }

    impl TimeoutClusterStateListener for Waiter {
        fn on_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_timeout(&self, _timeout: Duration) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn started() -> Arc<Lifecycle> {
        let lc = Arc::new(Lifecycle::new());
        lc.move_to_started();
        lc
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_on_timeout_and_unregisters() {
        let timeouts = NotifyTimeouts::new(Bus::new(8));
        let w = Arc::new(Waiter::default());
        timeouts.register(w.clone(), Duration::from_secs(1), started());
        assert_eq!(timeouts.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(w.timeouts.load(Ordering::SeqCst), 1);
        assert_eq!(timeouts.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_close() {
        let timeouts = NotifyTimeouts::new(Bus::new(8));
        let cancelled = Arc::new(Waiter::default());
        let closed = Arc::new(Waiter::default());
        timeouts.register(cancelled.clone(), Duration::from_secs(1), started());
        timeouts.register(closed.clone(), Duration::from_secs(1), started());

        timeouts.cancel_for(listener_key(&cancelled));
        timeouts.close_all();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(cancelled.timeouts.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.closes.load(Ordering::SeqCst), 0);
        assert_eq!(closed.closes.load(Ordering::SeqCst), 1);
        assert_eq!(closed.timeouts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let entry = NotifyTimeout {
            key: 1,
            listener: Arc::new(Waiter::default()),
            token: CancellationToken::new(),
            done: AtomicBool::new(false),
        };
        assert!(entry.claim());
        assert!(entry.token.is_cancelled());
        assert!(!entry.claim());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timer_and_close_race_resolves_once() {
        let timeouts = NotifyTimeouts::new(Bus::new(8));
        let lifecycle = started();
        let waiters: Vec<Arc<Waiter>> = (0..200).map(|_| Arc::new(Waiter::default())).collect();
        for (i, w) in waiters.iter().enumerate() {
            let timeout = Duration::from_micros(500 + (i as u64 % 7) * 100);
            timeouts.register(w.clone(), timeout, lifecycle.clone());
        }

        tokio::time::sleep(Duration::from_millis(1)).await;
        for w in waiters.iter().step_by(2) {
            timeouts.cancel_for(listener_key(w));
        }
        lifecycle.move_to_stopped();
        timeouts.close_all();
        tokio::time::sleep(Duration::from_millis(50)).await;

        for w in &waiters {
            let fired = w.timeouts.load(Ordering::SeqCst) + w.closes.load(Ordering::SeqCst);
            assert!(fired <= 1, "listener resolved {fired} times");
        }
        let closed_by_stop = waiters
            .iter()
            .skip(1)
            .step_by(2)
            .all(|w| w.timeouts.load(Ordering::SeqCst) + w.closes.load(Ordering::SeqCst) == 1);
        assert!(closed_by_stop);
        assert_eq!(timeouts.len(), 0);
    }
}
