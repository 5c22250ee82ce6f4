//! # ClusterService: the single writer of the cluster state.
//!
//! The [`ClusterService`] owns the current state, the update queue and its
//! worker, the listener tiers, the ack trackers and the reconnect loop.
//!
//! ## High-level architecture
//! ```text
//! submit_state_update_task(source, payload, config, executor, listener)
//!     │
//!     ├──► Batcher (filed under executor identity)
//!     ├──► queue timer (optional, races the batch for claim())
//!     └──► UpdateQueue (priority desc, insertion asc)
//!                │
//!                ▼
//!          update worker ──► run_tasks_for_executor ──► executor ──► publish ──► ArcSwap::store
//!                                                                          │
//!                                                  listeners (First/Normal/Last/PostApplied)
//!
//! Beside the worker:
//!   ReconnectToNodes loop  (every reconnect_interval)
//!   Bus ──► subscriber listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ## Shutdown path
//! ```text
//! stop()
//!   ├─► lifecycle = Stopped (new submissions resolve with Closed)
//!   ├─► notify timeouts: on_close(); ack trackers: on_ack_closed()
//!   ├─► cancel queue timers, worker and reconnect loop
//!   ├─► wait for the in-flight batch up to stop_grace (else GraceExceeded)
//!   └─► every entry left in the queue resolves with Closed / on_close()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::ack::AckTrackers;
use crate::core::batcher::Batcher;
use crate::core::builder::ClusterServiceBuilder;
use crate::core::config::ServiceConfig;
use crate::core::lifecycle::{Lifecycle, LifecycleState};
use crate::core::notify::NotifyTimeouts;
use crate::core::queue::{Job, QueueEntry, UpdateQueue};
use crate::core::reconnect::ReconnectToNodes;
use crate::core::task::UpdateTask;
use crate::discovery::Publisher;
use crate::error::{RuntimeError, TaskFailure};
use crate::events::{Bus, Event, EventKind};
use crate::listeners::{
    ClusterStateListener, ListenerRegistry, ListenerTier, LocalNodeMasterListener,
    LocalNodeMasterListeners, TimeoutClusterStateListener, isolated, listener_key,
};
use crate::state::{ClusterBlock, ClusterBlocks, ClusterState, Node};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{
    AckedTaskListener, ClusterStateTaskExecutor, ClusterStateUpdateTask, PendingClusterTask, Priority, TaskConfig,
    TaskListenerRef, UpdateTaskExecutor,
};
use crate::transport::Transport;

#[derive(Default)]
struct Handles {
    worker: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

/// Shared state of the service, reachable from the worker and the timers.
pub(crate) struct ServiceInner {
    pub(crate) cfg: ServiceConfig,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) state: Arc<ArcSwap<ClusterState>>,
    pub(crate) queue: UpdateQueue,
    pub(crate) batcher: Batcher,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) master_listeners: Arc<LocalNodeMasterListeners>,
    pub(crate) notify_timeouts: Arc<NotifyTimeouts>,
    pub(crate) ack_trackers: Arc<AckTrackers>,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) bus: Bus,
    slow_task_threshold_ms: AtomicU64,
    initial_blocks: Mutex<ClusterBlocks>,
    local_node: Node,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    /// Worker and reconnect loop.
    runtime_token: CancellationToken,
    /// Queue timeouts of submitted tasks.
    timers_token: CancellationToken,
    /// Event forwarding to subscribers.
    events_token: CancellationToken,
    handles: Mutex<Handles>,
}

impl ServiceInner {
    pub(crate) fn slow_task_logging_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_task_threshold_ms.load(Ordering::Relaxed))
    }

    fn spawn_subscriber_listener(&self) -> Option<JoinHandle<()>> {
        let subs = std::mem::take(&mut *self.subscribers.lock());
        if subs.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(subs, self.bus.clone());
        let mut rx = self.bus.subscribe();
        let token = self.events_token.clone();

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(ev),
                        Err(RecvError::Lagged(n)) => trace!("subscriber listener lagged by {n} events"),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(ev);
            }
            set.shutdown().await;
        }))
    }
}

/// Pops entries and runs them, one at a time, until cancelled.
async fn run_worker(inner: Arc<ServiceInner>, token: CancellationToken) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            entry = inner.queue.pop() => entry,
        };
        if !entry.job.is_pending() {
            trace!(source = entry.job.source(), "skipping resolved queue entry");
            entry.job.discard(&inner);
            continue;
        }
        inner.queue.begin(&entry);
        entry.job.run(&inner).await;
        inner.queue.finish();
    }
    trace!("update worker exited");
}

/// Queue job that registers a timeout listener on the update worker.
struct AddTimeoutListener {
    listener: Arc<dyn TimeoutClusterStateListener>,
    as_listener: Arc<dyn ClusterStateListener>,
    timeout: Option<Duration>,
    done: AtomicBool,
}

#[async_trait]
impl Job for AddTimeoutListener {
    fn source(&self) -> &str {
        "_add_listener_"
    }

    fn is_pending(&self) -> bool {
        !self.done.load(Ordering::Acquire)
    }

    async fn run(&self, service: &Arc<ServiceInner>) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if service.lifecycle.stopped_or_closed() {
            isolated(&service.bus, self.source(), "on_close", || self.listener.on_close());
            return;
        }
        if let Some(timeout) = self.timeout {
            service.notify_timeouts.register(
                Arc::clone(&self.listener),
                timeout,
                Arc::clone(&service.lifecycle),
            );
        }
        service
            .listeners
            .add(ListenerTier::PostApplied, Arc::clone(&self.as_listener));
        isolated(&service.bus, self.source(), "post_added", || self.listener.post_added());
    }

    fn reject(&self, bus: &Bus) {
        if !self.done.swap(true, Ordering::AcqRel) {
            isolated(bus, self.source(), "on_close", || self.listener.on_close());
        }
    }
}

/// Single-writer coordinator of the cluster state.
///
/// Build one with [`ClusterService::builder`]. Every mutation of the state
/// goes through [`submit_state_update_task`](Self::submit_state_update_task);
/// reads go through [`state`](Self::state) and never block.
pub struct ClusterService {
    inner: Arc<ServiceInner>,
}

impl ClusterService {
    /// Starts building a service for `local_node`.
    pub fn builder(local_node: Node) -> ClusterServiceBuilder {
        ClusterServiceBuilder::new(local_node)
    }

    pub(crate) fn from_parts(
        cfg: ServiceConfig,
        local_node: Node,
        publisher: Arc<dyn Publisher>,
        transport: Arc<dyn Transport>,
        subscribers: Vec<Arc<dyn Subscribe>>,
        initial_blocks: ClusterBlocks,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let initial = ClusterState::builder(cfg.cluster_name.as_str()).build();
        let threshold_ms = duration_millis(cfg.slow_task_logging_threshold);

        let inner = ServiceInner {
            lifecycle: Arc::new(Lifecycle::new()),
            state: Arc::new(ArcSwap::new(initial)),
            queue: UpdateQueue::new(),
            batcher: Batcher::new(),
            listeners: ListenerRegistry::new(bus.clone()),
            master_listeners: Arc::new(LocalNodeMasterListeners::new()),
            notify_timeouts: NotifyTimeouts::new(bus.clone()),
            ack_trackers: AckTrackers::new(),
            publisher,
            transport,
            bus,
            slow_task_threshold_ms: AtomicU64::new(threshold_ms),
            initial_blocks: Mutex::new(initial_blocks),
            local_node,
            subscribers: Mutex::new(subscribers),
            runtime_token: CancellationToken::new(),
            timers_token: CancellationToken::new(),
            events_token: CancellationToken::new(),
            handles: Mutex::new(Handles::default()),
            cfg,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Adds a block to the state the service starts with.
    pub fn add_initial_state_block(&self, block: ClusterBlock) -> Result<(), RuntimeError> {
        if self.inner.lifecycle.state() != LifecycleState::Initialized {
            return Err(RuntimeError::AlreadyStarted);
        }
        let mut blocks = self.inner.initial_blocks.lock();
        *blocks = blocks.with_global_block(block);
        Ok(())
    }

    /// Removes a block from the state the service starts with.
    pub fn remove_initial_state_block(&self, block: &ClusterBlock) -> Result<(), RuntimeError> {
        if self.inner.lifecycle.state() != LifecycleState::Initialized {
            return Err(RuntimeError::AlreadyStarted);
        }
        let mut blocks = self.inner.initial_blocks.lock();
        *blocks = blocks.without_global_block(block);
        Ok(())
    }

    /// Applies the local node and initial blocks, then spawns the update worker,
    /// the reconnect loop and the subscriber fan-out.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        if !inner.lifecycle.move_to_started() {
            return Err(RuntimeError::AlreadyStarted);
        }
        inner
            .listeners
            .add(ListenerTier::Normal, inner.master_listeners.clone());

        let current = inner.state.load_full();
        let nodes = current
            .nodes()
            .to_builder()
            .put(inner.local_node.clone())
            .local_node_id(inner.local_node.id())
            .build();
        let blocks = inner.initial_blocks.lock().clone();
        inner.state.store(
            ClusterState::builder_from(&current)
                .nodes(nodes)
                .blocks(blocks)
                .build(),
        );

        let forwarder = inner.spawn_subscriber_listener();
        let worker = tokio::spawn(run_worker(
            Arc::clone(inner),
            inner.runtime_token.clone(),
        ));
        let reconnect = ReconnectToNodes::new(
            Arc::clone(&inner.state),
            Arc::clone(&inner.transport),
            inner.bus.clone(),
            inner.cfg.reconnect_failure_log_every_clamped(),
        );
        let reconnect = tokio::spawn(
            reconnect.run(inner.cfg.reconnect_interval, inner.runtime_token.clone()),
        );
        *inner.handles.lock() = Handles {
            worker: Some(worker),
            reconnect: Some(reconnect),
            forwarder,
        };

        info!(node = %inner.local_node, "cluster service started");
        inner.bus.publish(Event::new(EventKind::ServiceStarted));
        Ok(())
    }

    /// Stops accepting work and resolves everything still outstanding.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] if the in-flight batch did not
    /// finish within `stop_grace`; queued work is resolved either way.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        if !inner.lifecycle.move_to_stopped() {
            return match inner.lifecycle.state() {
                LifecycleState::Initialized => Err(RuntimeError::NotStarted),
                _ => Ok(()),
            };
        }
        info!("stopping cluster service");

        inner.listeners.remove(&inner.master_listeners);
        inner.notify_timeouts.close_all();
        inner.ack_trackers.close_all();
        inner.timers_token.cancel();
        inner.runtime_token.cancel();

        let handles = std::mem::take(&mut *inner.handles.lock());
        let grace = inner.cfg.stop_grace;
        let mut result = Ok(());
        if let Some(worker) = handles.worker {
            if tokio::time::timeout(grace, worker).await.is_err() {
                let in_flight = inner.queue.executing_source();
                warn!(?in_flight, "update worker did not stop within {grace:?}");
                result = Err(RuntimeError::GraceExceeded { grace, in_flight });
            }
        }
        if let Some(reconnect) = handles.reconnect {
            reconnect.abort();
        }

        let leftover = inner.queue.drain();
        if !leftover.is_empty() {
            debug!(count = leftover.len(), "rejecting queued work on stop");
        }
        for entry in leftover {
            entry.job.reject(&inner.bus);
        }
        inner.batcher.clear();

        inner.bus.publish(Event::new(EventKind::ServiceStopped));
        inner.events_token.cancel();
        if let Some(forwarder) = handles.forwarder {
            let _ = tokio::time::timeout(grace, forwarder).await;
        }
        result
    }

    /// Stops the service if needed and marks it closed.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        let result = if self.inner.lifecycle.is_started() {
            self.stop().await
        } else {
            Ok(())
        };
        self.inner.lifecycle.move_to_closed();
        result
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Queues `payload` for `executor`.
    ///
    /// Never blocks and never runs the task inline. The outcome is delivered
    /// **exactly once** through `listener`; if the service is not started that
    /// is an immediate `on_failure(Closed)`.
    pub fn submit_state_update_task<T>(
        &self,
        source: impl Into<Arc<str>>,
        payload: T,
        config: TaskConfig,
        executor: Arc<dyn ClusterStateTaskExecutor<T>>,
        listener: TaskListenerRef,
    ) where
        T: Send + Sync + 'static,
    {
        let inner = &self.inner;
        let source: Arc<str> = source.into();
        if !inner.lifecycle.is_started() {
            debug!(source = &*source, "rejecting cluster state task, service not started");
            inner
                .bus
                .publish(Event::new(EventKind::TaskRejected).with_source(source.clone()));
            listener.on_failure(&source, TaskFailure::Closed);
            return;
        }

        let order = inner.queue.next_insertion_order();
        let timeout = config.timeout();
        let timer = timeout.map(|_| inner.timers_token.child_token());
        let task = UpdateTask::new(source.clone(), payload, executor, listener, timer);

        inner.batcher.add(Arc::clone(&task));
        if let Some(timeout) = timeout {
            task.schedule_timeout(timeout, inner.bus.clone());
        }
        inner
            .queue
            .push(QueueEntry::new(config.priority(), order, task.clone()));
        inner.bus.publish(
            Event::new(EventKind::TaskSubmitted)
                .with_source(source)
                .with_reason(config.priority().to_string()),
        );

        // stop() may have drained the queue between the check above and the push
        if !inner.lifecycle.is_started() {
            task.reject(&inner.bus);
        }
    }

    /// Queues a self-executing task; it always runs in a batch of its own.
    pub fn submit_update<U>(&self, source: impl Into<Arc<str>>, task: Arc<U>)
    where
        U: ClusterStateUpdateTask,
    {
        let config = task.config();
        let executor: Arc<dyn ClusterStateTaskExecutor<()>> =
            Arc::new(UpdateTaskExecutor::new(Arc::clone(&task)));
        self.submit_state_update_task(source, (), config, executor, TaskListenerRef::plain(task));
    }

    /// Like [`submit_update`](Self::submit_update), for a task that also waits
    /// for the published state to be acknowledged.
    pub fn submit_acked_update<U>(&self, source: impl Into<Arc<str>>, task: Arc<U>)
    where
        U: ClusterStateUpdateTask + AckedTaskListener,
    {
        let config = task.config();
        let executor: Arc<dyn ClusterStateTaskExecutor<()>> =
            Arc::new(UpdateTaskExecutor::new(Arc::clone(&task)));
        self.submit_state_update_task(source, (), config, executor, TaskListenerRef::acked(task));
    }

    /// Registers `listener` in `tier`; `false` if it is already registered.
    pub fn add_listener(&self, tier: ListenerTier, listener: Arc<dyn ClusterStateListener>) -> bool {
        self.inner.listeners.add(tier, listener)
    }

    /// Registers a post-applied listener through the update queue.
    ///
    /// Registration happens on the worker, after which `post_added` is called.
    /// With a `timeout`, `on_timeout` fires unless the listener is removed first.
    /// If the service is not running, `on_close` is called instead.
    pub fn add_timeout_listener<L>(&self, timeout: Option<Duration>, listener: Arc<L>)
    where
        L: TimeoutClusterStateListener,
    {
        let inner = &self.inner;
        if !inner.lifecycle.is_started() {
            listener.on_close();
            return;
        }
        let job = Arc::new(AddTimeoutListener {
            listener: listener.clone(),
            as_listener: listener,
            timeout,
            done: AtomicBool::new(false),
        });
        let order = inner.queue.next_insertion_order();
        inner
            .queue
            .push(QueueEntry::new(Priority::High, order, job.clone()));
        if !inner.lifecycle.is_started() {
            job.reject(&inner.bus);
        }
    }

    /// Removes `listener` from whichever tier holds it and cancels its timeout.
    pub fn remove_listener<L: ?Sized>(&self, listener: &Arc<L>) -> bool {
        let key = listener_key(listener);
        self.inner.notify_timeouts.cancel_for(key);
        self.inner.listeners.remove_key(key)
    }

    pub fn add_local_master_listener(&self, listener: Arc<dyn LocalNodeMasterListener>) {
        self.inner.master_listeners.add(listener);
    }

    pub fn remove_local_master_listener<L: ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.inner.master_listeners.remove(listener)
    }

    /// The current state. Lock-free; always a complete snapshot.
    pub fn state(&self) -> Arc<ClusterState> {
        self.inner.state.load_full()
    }

    pub fn local_node(&self) -> &Node {
        &self.inner.local_node
    }

    /// The executing entry plus every queued, unresolved entry, in run order.
    pub fn pending_tasks(&self) -> Vec<PendingClusterTask> {
        self.inner.queue.pending_tasks()
    }

    pub fn pending_task_count(&self) -> usize {
        self.inner.queue.pending_task_count()
    }

    /// Age of the oldest queued, unresolved entry (zero when idle).
    pub fn max_task_wait_time(&self) -> Duration {
        self.inner.queue.max_task_wait_time()
    }

    /// Receiver of runtime events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    pub fn set_slow_task_logging_threshold(&self, threshold: Duration) {
        self.inner
            .slow_task_threshold_ms
            .store(duration_millis(threshold), Ordering::Relaxed);
    }

    pub fn slow_task_logging_threshold(&self) -> Duration {
        self.inner.slow_task_logging_threshold()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.cfg
    }
}

impl Drop for ClusterService {
    fn drop(&mut self) {
        self.inner.runtime_token.cancel();
        self.inner.timers_token.cancel();
        self.inner.events_token.cancel();
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::tasks::{BatchResult, ExecutorFn, ListenerFn};

    fn service() -> ClusterService {
        ClusterService::builder(Node::new("n1", "node-1", "127.0.0.1:9300")).build()
    }

    fn noop() -> Arc<dyn ClusterStateTaskExecutor<u8>> {
        ExecutorFn::arc(|s: &Arc<ClusterState>, t: &[&u8]| {
            Ok::<_, ExecutorError>(BatchResult::builder().successes(0..t.len()).build(s.clone()))
        })
    }

    #[tokio::test]
    async fn test_submit_before_start_is_closed() {
        let svc = service();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let f = failures.clone();
        svc.submit_state_update_task(
            "early",
            1u8,
            TaskConfig::default(),
            noop(),
            ListenerFn::new()
                .on_failure(move |_, e| f.lock().push(e.as_label()))
                .into_ref(),
        );
        assert_eq!(*failures.lock(), ["task_closed"]);
        assert_eq!(svc.pending_task_count(), 0);
    }

    #[tokio::test]
    async fn test_start_applies_local_node_and_initial_blocks() {
        let svc = service();
        let custom = ClusterBlock::new(99, "maintenance");
        svc.add_initial_state_block(custom.clone()).unwrap();
        svc.remove_initial_state_block(&ClusterBlock::no_master()).unwrap();

        svc.start().unwrap();
        assert!(matches!(svc.start(), Err(RuntimeError::AlreadyStarted)));
        assert!(matches!(
            svc.add_initial_state_block(ClusterBlock::no_master()),
            Err(RuntimeError::AlreadyStarted)
        ));

        let state = svc.state();
        assert_eq!(state.nodes().local_node_id(), Some("n1"));
        assert!(state.blocks().has_global_block(&custom));
        assert!(!state.blocks().has_global_block(&ClusterBlock::no_master()));
        assert!(!state.nodes().local_node_master());

        svc.stop().await.unwrap();
        assert_eq!(svc.lifecycle_state(), LifecycleState::Stopped);
        svc.close().await.unwrap();
        assert_eq!(svc.lifecycle_state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_an_error() {
        let svc = service();
        assert!(matches!(svc.stop().await, Err(RuntimeError::NotStarted)));
        svc.close().await.unwrap();
        assert!(matches!(svc.start(), Err(RuntimeError::AlreadyStarted)));
    }

    /// Holds every publish until permits are added.
    struct GatedPublisher(tokio::sync::Semaphore);

    #[async_trait]
    impl Publisher for GatedPublisher {
        async fn publish(
            &self,
            _event: &crate::state::ClusterChangedEvent,
            _ack_listener: Arc<dyn crate::discovery::AckListener>,
        ) -> Result<(), crate::error::PublishError> {
            let _permit = self.0.acquire().await;
            Ok(())
        }
    }

    /// Bumps the version; counts queue timeouts.
    struct Expiring {
        timed_out: Arc<AtomicU64>,
    }

    impl crate::tasks::TaskListener for Expiring {
        fn on_failure(&self, _source: &str, failure: TaskFailure) {
            if matches!(failure, TaskFailure::Timeout { .. }) {
                self.timed_out.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl ClusterStateUpdateTask for Expiring {
        fn execute(&self, current: &Arc<ClusterState>) -> Result<Arc<ClusterState>, ExecutorError> {
            Ok(ClusterState::builder_from(current).build())
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(10))
        }
    }

    fn elect() -> Arc<dyn ClusterStateTaskExecutor<()>> {
        ExecutorFn::arc_any_node(|state: &Arc<ClusterState>, tasks: &[&()]| {
            let nodes = state
                .nodes()
                .to_builder()
                .master_node_id(state.nodes().local_node_id().map(Arc::<str>::from))
                .build();
            let next = ClusterState::builder_from(state).nodes(nodes).build();
            Ok::<_, ExecutorError>(BatchResult::builder().successes(0..tasks.len()).build(next))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_updates_leave_no_batches_behind() {
        let gate = Arc::new(GatedPublisher(tokio::sync::Semaphore::new(0)));
        let svc = ClusterService::builder(Node::new("n1", "node-1", "127.0.0.1:9300"))
            .with_publisher(gate.clone())
            .build();
        svc.start().unwrap();

        svc.submit_state_update_task("elect", (), TaskConfig::default(), elect(), ListenerFn::new().into_ref());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(svc.pending_task_count(), 1);

        let timed_out = Arc::new(AtomicU64::new(0));
        for i in 0..64 {
            svc.submit_update(
                format!("update-{i}"),
                Arc::new(Expiring {
                    timed_out: timed_out.clone(),
                }),
            );
        }
        assert_eq!(svc.inner.batcher.executor_count(), 64);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(timed_out.load(Ordering::SeqCst), 64);

        gate.0.add_permits(1);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(svc.pending_task_count(), 0);
        assert_eq!(svc.inner.batcher.executor_count(), 0);
        assert!(svc.state().nodes().local_node_master());
        svc.stop().await.unwrap();
    }

    #[test]
    fn test_slow_task_threshold_is_adjustable() {
        let svc = service();
        assert_eq!(svc.slow_task_logging_threshold(), Duration::from_secs(30));
        svc.set_slow_task_logging_threshold(Duration::from_millis(250));
        assert_eq!(svc.slow_task_logging_threshold(), Duration::from_millis(250));
    }
}
