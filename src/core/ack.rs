//! # Publish acknowledgement tracking.
//!
//! For every acked task of a published batch the master creates an
//! [`AckCountDown`] expecting one ack per node the listener `must_ack`
//! (at least one: the master acks itself after applying).
//!
//! ## Race
//! ```text
//! node acks ──► count_down() ──► reaches 0? ──► cancel timer, on_all_nodes_acked(last_failure)
//! ack timer ──► fast_forward() ──► was > 0? ──► on_ack_timeout()
//! stop()    ──► fast_forward() ──► was > 0? ──► on_ack_closed()
//! ```
//! Exactly one of the three wins; the losers are no-ops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::discovery::AckListener;
use crate::error::NodeAckError;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::isolated;
use crate::state::{Node, Nodes};
use crate::tasks::AckedTaskListener;

/// Atomic countdown that reports the transition to zero exactly once.
pub(crate) struct CountDown {
    count: AtomicUsize,
}

impl CountDown {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
        }
    }

    /// Decrements; `true` only for the call that reached zero.
    pub(crate) fn count_down(&self) -> bool {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        {
            Ok(prev) => prev == 1,
            Err(_) => false,
        }
    }

    /// Jumps to zero; `true` if the count was not zero yet.
    pub(crate) fn fast_forward(&self) -> bool {
        self.count.swap(0, Ordering::AcqRel) > 0
    }

    #[cfg(test)]
    pub(crate) fn is_done(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }
}

/// Ack tracker of one acked task for one published version.
pub(crate) struct AckCountDown {
    id: u64,
    source: Arc<str>,
    listener: Arc<dyn AckedTaskListener>,
    version: u64,
    master_node_id: Option<Arc<str>>,
    count_down: CountDown,
    last_failure: Mutex<Option<NodeAckError>>,
    timer: CancellationToken,
    trackers: Weak<AckTrackers>,
    bus: Bus,
}

impl AckCountDown {
    /// Registers a tracker for `version` and arms its timeout.
    pub(crate) fn start(
        trackers: &Arc<AckTrackers>,
        source: Arc<str>,
        listener: Arc<dyn AckedTaskListener>,
        version: u64,
        nodes: &Nodes,
        timeout: Duration,
        bus: Bus,
    ) -> Arc<Self> {
        let mut expected = 1;
        isolated(&bus, &source, "must_ack", || {
            expected = nodes.iter().filter(|n| listener.must_ack(n)).count().max(1);
        });
        trace!(version, expected, "expecting acks");

        let tracker = Arc::new(Self {
            id: trackers.next_id(),
            source,
            listener,
            version,
            master_node_id: nodes.master_node_id().map(Arc::from),
            count_down: CountDown::new(expected),
            last_failure: Mutex::new(None),
            timer: CancellationToken::new(),
            trackers: Arc::downgrade(trackers),
            bus,
        });
        trackers.insert(Arc::clone(&tracker));

        let timer = tracker.timer.clone();
        let weak = Arc::downgrade(&tracker);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Some(tracker) = weak.upgrade() {
                        tracker.on_timeout();
                    }
                }
            }
        });
        tracker
    }

    fn is_master(&self, node: &Node) -> bool {
        self.master_node_id.as_deref() == Some(node.id())
    }

    fn detach(&self) {
        self.timer.cancel();
        if let Some(trackers) = self.trackers.upgrade() {
            trackers.remove(self.id);
        }
    }

    pub(crate) fn on_node_ack(&self, node: &Node, failure: Option<NodeAckError>) {
        // the master always acks, even when the listener does not require it
        let mut required = false;
        isolated(&self.bus, &self.source, "must_ack", || {
            required = self.listener.must_ack(node);
        });
        if !required && !self.is_master(node) {
            return;
        }
        if let Some(failure) = failure {
            debug!(
                version = self.version,
                node = node.id(),
                "ack received with failure: {failure}"
            );
            *self.last_failure.lock() = Some(failure);
        } else {
            trace!(version = self.version, node = node.id(), "ack received");
        }

        if self.count_down.count_down() {
            trace!(version = self.version, "all expected nodes acknowledged");
            self.detach();
            let failure = self.last_failure.lock().take();
            let mut ev = Event::new(EventKind::AllNodesAcked).with_version(self.version);
            if let Some(f) = &failure {
                ev = ev.with_reason(f.to_string());
            }
            self.bus.publish(ev);
            isolated(&self.bus, &self.source, "on_all_nodes_acked", || {
                self.listener.on_all_nodes_acked(failure)
            });
        }
    }

    fn on_timeout(&self) {
        if self.count_down.fast_forward() {
            trace!(version = self.version, "timeout waiting for acknowledgements");
            self.detach();
            self.bus
                .publish(Event::new(EventKind::AckTimeout).with_version(self.version));
            isolated(&self.bus, &self.source, "on_ack_timeout", || {
                self.listener.on_ack_timeout()
            });
        }
    }

    fn on_close(&self) {
        if self.count_down.fast_forward() {
            self.timer.cancel();
            isolated(&self.bus, &self.source, "on_ack_closed", || {
                self.listener.on_ack_closed()
            });
        }
    }

    /// Gives up silently; the task was already resolved through `on_failure`.
    pub(crate) fn abandon(&self) {
        if self.count_down.fast_forward() {
            self.detach();
        }
    }
}

/// Forwards publisher acks to every tracker of a batch.
pub(crate) struct DelegatingAckListener {
    trackers: Vec<Arc<AckCountDown>>,
}

impl DelegatingAckListener {
    pub(crate) fn new(trackers: Vec<Arc<AckCountDown>>) -> Self {
        Self { trackers }
    }

    pub(crate) fn abandon_all(&self) {
        for t in &self.trackers {
            t.abandon();
        }
    }
}

impl AckListener for DelegatingAckListener {
    fn on_node_ack(&self, node: &Node, failure: Option<NodeAckError>) {
        for t in &self.trackers {
            t.on_node_ack(node, failure.clone());
        }
    }
}

/// Live trackers, so `stop()` can close whatever is still waiting.
pub(crate) struct AckTrackers {
    live: Mutex<HashMap<u64, Arc<AckCountDown>>>,
    next: AtomicU64,
}

impl AckTrackers {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            live: Mutex::new(HashMap::new()),
            next: AtomicU64::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, tracker: Arc<AckCountDown>) {
        self.live.lock().insert(tracker.id, tracker);
    }

    fn remove(&self, id: u64) {
        self.live.lock().remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// Resolves every live tracker with `on_ack_closed`.
    pub(crate) fn close_all(&self) {
        let live: Vec<_> = self.live.lock().drain().map(|(_, t)| t).collect();
        for t in live {
            t.on_close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFailure;
    use crate::tasks::{AckedListenerFn, ListenerFn};

    #[derive(Default)]
    struct Outcome {
        acked: Mutex<Vec<Option<NodeAckError>>>,
        timeouts: AtomicUsize,
        closed: AtomicUsize,
    }

    fn listener(out: &Arc<Outcome>, must_ack_data_only: bool) -> Arc<dyn AckedTaskListener> {
        let (a, b, c) = (out.clone(), out.clone(), out.clone());
        Arc::new(
            AckedListenerFn::new(
                ListenerFn::new().on_failure(|_, _: TaskFailure| {}),
                Some(Duration::from_secs(1)),
            )
            .must_ack(move |n: &Node| !must_ack_data_only || !n.is_client())
            .on_all_nodes_acked(move |f| a.acked.lock().push(f))
            .on_ack_timeout(move || {
                b.timeouts.fetch_add(1, Ordering::SeqCst);
            })
            .on_ack_closed(move || {
                c.closed.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn nodes() -> Nodes {
        Nodes::builder()
            .put(Node::new("m", "master", "10.0.0.1:9300"))
            .put(Node::new("d", "data", "10.0.0.2:9300"))
            .put(Node::new("c", "client", "10.0.0.3:9300").with_client(true))
            .local_node_id("m")
            .master_node_id(Some("m".into()))
            .build()
    }

    #[test]
    fn test_count_down_reports_zero_once() {
        let cd = CountDown::new(2);
        assert!(!cd.count_down());
        assert!(cd.count_down());
        assert!(!cd.count_down());
        assert!(cd.is_done());
        assert!(!cd.fast_forward());

        let cd = CountDown::new(3);
        assert!(cd.fast_forward());
        assert!(!cd.count_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_acked_beats_timeout() {
        let trackers = AckTrackers::new();
        let out = Arc::new(Outcome::default());
        let nodes = nodes();
        let t = AckCountDown::start(&trackers, "acked".into(), listener(&out, true), 7, &nodes, Duration::from_secs(1), Bus::new(8));
        assert_eq!(trackers.len(), 1);

        let failure = NodeAckError {
            node: "d".into(),
            reason: "disk full".into(),
        };
        t.on_node_ack(nodes.get("c").unwrap(), None);
        t.on_node_ack(nodes.get("d").unwrap(), Some(failure.clone()));
        t.on_node_ack(nodes.get("m").unwrap(), None);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*out.acked.lock(), [Some(failure)]);
        assert_eq!(out.timeouts.load(Ordering::SeqCst), 0);
        assert_eq!(trackers.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_beats_late_acks() {
        let trackers = AckTrackers::new();
        let out = Arc::new(Outcome::default());
        let nodes = nodes();
        let t = AckCountDown::start(&trackers, "acked".into(), listener(&out, false), 7, &nodes, Duration::from_secs(1), Bus::new(8));

        t.on_node_ack(nodes.get("m").unwrap(), None);
        tokio::time::sleep(Duration::from_secs(2)).await;
        for n in nodes.iter() {
            t.on_node_ack(n, None);
        }

        assert_eq!(out.timeouts.load(Ordering::SeqCst), 1);
        assert!(out.acked.lock().is_empty());
        assert_eq!(trackers.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_and_abandon() {
        let trackers = AckTrackers::new();
        let out = Arc::new(Outcome::default());
        let nodes = nodes();
        let closed = AckCountDown::start(&trackers, "acked".into(), listener(&out, false), 1, &nodes, Duration::from_secs(1), Bus::new(8));
        let abandoned = AckCountDown::start(&trackers, "acked".into(), listener(&out, false), 1, &nodes, Duration::from_secs(1), Bus::new(8));

        DelegatingAckListener::new(vec![abandoned]).abandon_all();
        assert_eq!(trackers.len(), 1);
        trackers.close_all();
        closed.on_node_ack(nodes.get("m").unwrap(), None);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(out.closed.load(Ordering::SeqCst), 1);
        assert_eq!(out.timeouts.load(Ordering::SeqCst), 0);
        assert!(out.acked.lock().is_empty());
    }
}
