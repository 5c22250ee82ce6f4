//! # Single-writer priority queue.
//!
//! Every piece of work the update worker performs enters through [`UpdateQueue`].
//! Entries are ordered by `(priority desc, insertion_order asc)` and popped by
//! exactly one worker.
//!
//! ## Rules
//! - `push()` never blocks beyond a short mutex section and never runs work inline.
//! - Entries already resolved elsewhere (timed out, rejected) stay in the heap
//!   until popped and are then skipped by the worker.
//! - Introspection (`pending_tasks`, `max_task_wait_time`) sees the executing
//!   entry plus every queued entry that is still pending.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::service::ServiceInner;
use crate::events::Bus;
use crate::tasks::{PendingClusterTask, Priority};

/// Unit of work run by the update worker.
#[async_trait]
pub(crate) trait Job: Send + Sync + 'static {
    fn source(&self) -> &str;

    /// `false` once the job was resolved (claimed by a batch, timed out or rejected).
    fn is_pending(&self) -> bool;

    async fn run(&self, service: &Arc<ServiceInner>);

    /// Resolves the job as closed if it is still pending.
    fn reject(&self, bus: &Bus);

    /// Called by the worker when it pops an entry that was already resolved.
    fn discard(&self, _service: &ServiceInner) {}
}

/// Heap entry wrapping a [`Job`].
pub(crate) struct QueueEntry {
    pub(crate) priority: Priority,
    pub(crate) insertion_order: u64,
    pub(crate) inserted_at: Instant,
    pub(crate) job: Arc<dyn Job>,
}

impl QueueEntry {
    pub(crate) fn new(priority: Priority, insertion_order: u64, job: Arc<dyn Job>) -> Self {
        Self {
            priority,
            insertion_order,
            inserted_at: Instant::now(),
            job,
        }
    }

    fn pending_view(&self, now: Instant, executing: bool) -> PendingClusterTask {
        PendingClusterTask {
            insertion_order: self.insertion_order,
            priority: self.priority,
            source: self.job.source().to_string(),
            time_in_queue: now.saturating_duration_since(self.inserted_at),
            executing,
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Max-heap order: higher priority first, then lower insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.insertion_order.cmp(&self.insertion_order))
    }
}

/// Priority queue feeding the update worker.
pub(crate) struct UpdateQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    executing: Mutex<Option<(PendingClusterTask, Instant)>>,
    notify: Notify,
    next_order: AtomicU64,
}

impl UpdateQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            executing: Mutex::new(None),
            notify: Notify::new(),
            next_order: AtomicU64::new(0),
        }
    }

    /// Allocates the next global insertion order.
    pub(crate) fn next_insertion_order(&self) -> u64 {
        self.next_order.fetch_add(1, AtomicOrdering::Relaxed)
    }

    pub(crate) fn push(&self, entry: QueueEntry) {
        self.heap.lock().push(entry);
        self.notify.notify_one();
    }

    /// Waits for the head entry. Cancel-safe: an entry is only removed when returned.
    pub(crate) async fn pop(&self) -> QueueEntry {
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.heap.lock().pop() {
                return entry;
            }
            notified.await;
        }
    }

    /// Removes every queued entry.
    pub(crate) fn drain(&self) -> Vec<QueueEntry> {
        std::mem::take(&mut *self.heap.lock()).into_vec()
    }

    /// Marks `entry` as the one the worker is running.
    pub(crate) fn begin(&self, entry: &QueueEntry) {
        let view = entry.pending_view(Instant::now(), true);
        *self.executing.lock() = Some((view, entry.inserted_at));
    }

    pub(crate) fn finish(&self) {
        *self.executing.lock() = None;
    }

    /// Source of the entry the worker is running, if any.
    pub(crate) fn executing_source(&self) -> Option<String> {
        self.executing.lock().as_ref().map(|(p, _)| p.source.clone())
    }

    /// Executing entry plus unresolved queued entries, in run order.
    pub(crate) fn pending_tasks(&self) -> Vec<PendingClusterTask> {
        let now = Instant::now();
        let mut out: Vec<PendingClusterTask> = self
            .heap
            .lock()
            .iter()
            .filter(|e| e.job.is_pending())
            .map(|e| e.pending_view(now, false))
            .collect();
        if let Some((mut executing, inserted_at)) = self.executing.lock().clone() {
            executing.time_in_queue = now.saturating_duration_since(inserted_at);
            out.push(executing);
        }
        out.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.insertion_order.cmp(&b.insertion_order))
        });
        out
    }

    pub(crate) fn pending_task_count(&self) -> usize {
        let queued = self
            .heap
            .lock()
            .iter()
            .filter(|e| e.job.is_pending())
            .count();
        queued + usize::from(self.executing.lock().is_some())
    }

    /// Age of the oldest unresolved queued entry; zero when there is none.
    pub(crate) fn max_task_wait_time(&self) -> Duration {
        let now = Instant::now();
        self.heap
            .lock()
            .iter()
            .filter(|e| e.job.is_pending())
            .map(|e| e.inserted_at)
            .min()
            .map_or(Duration::ZERO, |oldest| now.saturating_duration_since(oldest))
    }
}
