//! # Runtime events emitted by the cluster state service.
//!
//! [`EventKind`] classifies what happened inside the pipeline:
//! - **Task events**: submission, rejection, queue timeout, no-longer-master
//! - **Batch events**: executor failure, unchanged state, publish failure, applied state, slow batch
//! - **Ack events**: all nodes acked, ack timeout
//! - **Maintenance events**: node reconnect failures, listener/subscriber panics, lifecycle
//!
//! [`Event`] carries optional metadata (source label, state version, node, reason, elapsed time).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use clustervisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StateApplied)
//!     .with_source("create-index [logs]")
//!     .with_version(42)
//!     .with_took(Duration::from_millis(12));
//!
//! assert_eq!(ev.kind, EventKind::StateApplied);
//! assert_eq!(ev.source.as_deref(), Some("create-index [logs]"));
//! assert_eq!(ev.version, Some(42));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle ===
    /// The service started its update worker.
    ServiceStarted,
    /// The service stopped accepting work.
    ServiceStopped,

    // === Tasks ===
    /// A task entered the queue.
    ///
    /// Sets: `source`, `priority` (in `reason`).
    TaskSubmitted,
    /// A task was refused or dropped because the service is not running.
    ///
    /// Sets: `source`.
    TaskRejected,
    /// A task's queue timeout elapsed before it ran.
    ///
    /// Sets: `source`, `took_ms` (the configured timeout).
    TaskTimedOut,
    /// A master-only batch reached a non-master node.
    ///
    /// Sets: `source`.
    NoLongerMaster,

    // === Batches ===
    /// The executor returned an error or panicked; the whole batch failed.
    ///
    /// Sets: `source`, `version` (unchanged state), `reason`, `took_ms`.
    ExecutorFailed,
    /// The executor returned the same state; nothing was published.
    ///
    /// Sets: `source`, `version`, `took_ms`.
    StateUnchanged,
    /// The publisher failed to commit; the batch failed and the state was not applied.
    ///
    /// Sets: `source`, `version` (rejected state), `reason`.
    PublishFailed,
    /// A new state became current.
    ///
    /// Sets: `source`, `version`, `took_ms`.
    StateApplied,
    /// A batch ran longer than the slow task threshold.
    ///
    /// Sets: `source`, `took_ms`.
    SlowTask,

    // === Acknowledgements ===
    /// Every required node acknowledged a published state.
    ///
    /// Sets: `version`, `reason` (last node failure, if any).
    AllNodesAcked,
    /// Acknowledgements did not complete within the ack timeout.
    ///
    /// Sets: `version`.
    AckTimeout,

    // === Maintenance ===
    /// Reconnecting to a known node failed (every Nth consecutive failure).
    ///
    /// Sets: `node`, `reason`.
    NodeReconnectFailed,
    /// A cluster state listener panicked; remaining listeners still ran.
    ///
    /// Sets: `source`, `reason`.
    ListenerPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (subscriber name), `reason`.
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `source` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Source label of the task or batch, or subscriber name.
    pub source: Option<Arc<str>>,
    /// Cluster state version involved.
    pub version: Option<u64>,
    /// Node id involved.
    pub node: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Elapsed or configured duration in milliseconds (compact).
    pub took_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            version: None,
            node: None,
            reason: None,
            took_ms: None,
        }
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    #[inline]
    pub fn with_node(mut self, node: impl Into<Arc<str>>) -> Self {
        self.node = Some(node.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_took(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.took_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskSubmitted);
        let b = Event::new(EventKind::TaskSubmitted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_took_is_clamped() {
        let ev = Event::new(EventKind::SlowTask).with_took(Duration::from_secs(u64::MAX));
        assert_eq!(ev.took_ms, Some(u32::MAX));
    }
}
