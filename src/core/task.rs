//! # Queued update task.
//!
//! An [`UpdateTask`] carries one submission through the pipeline. It resolves
//! **exactly once**: whoever wins [`UpdateTask::claim`] (the batch that runs it,
//! its queue timer, or `stop()`) owns the listener callback, every other path
//! is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::queue::Job;
use crate::core::service::ServiceInner;
use crate::error::TaskFailure;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::isolated;
use crate::tasks::{ClusterStateTaskExecutor, TaskListenerRef};

pub(crate) struct UpdateTask<T> {
    source: Arc<str>,
    payload: T,
    executor: Arc<dyn ClusterStateTaskExecutor<T>>,
    listener: TaskListenerRef,
    processed: AtomicBool,
    timer: Option<CancellationToken>,
}

impl<T: Send + Sync + 'static> UpdateTask<T> {
    /// `timer` is the cancellation handle of the queue timeout, if the task has one.
    pub(crate) fn new(
        source: Arc<str>,
        payload: T,
        executor: Arc<dyn ClusterStateTaskExecutor<T>>,
        listener: TaskListenerRef,
        timer: Option<CancellationToken>,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            payload,
            executor,
            listener,
            processed: AtomicBool::new(false),
            timer,
        })
    }

    /// Marks the task processed; `true` only for the first caller.
    pub(crate) fn claim(&self) -> bool {
        let won = !self.processed.swap(true, Ordering::AcqRel);
        if won {
            if let Some(timer) = &self.timer {
                timer.cancel();
            }
        }
        won
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn payload(&self) -> &T {
        &self.payload
    }

    pub(crate) fn executor(&self) -> &Arc<dyn ClusterStateTaskExecutor<T>> {
        &self.executor
    }

    pub(crate) fn listener(&self) -> &TaskListenerRef {
        &self.listener
    }

    /// Fails the task with [`TaskFailure::Timeout`] unless it is claimed within `timeout`.
    pub(crate) fn schedule_timeout(self: &Arc<Self>, timeout: Duration, bus: Bus) {
        let Some(token) = self.timer.clone() else {
            return;
        };
        let task = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if task.claim() {
                        debug!(source = task.source(), "cluster state task timed out after {timeout:?}");
                        bus.publish(
                            Event::new(EventKind::TaskTimedOut)
                                .with_source(task.source.clone())
                                .with_took(timeout),
                        );
                        isolated(&bus, &task.source, "on_failure", || {
                            task.listener.on_failure(
                                &task.source,
                                TaskFailure::Timeout {
                                    origin: task.source.clone(),
                                    timeout,
                                },
                            )
                        });
                    }
                }
            }
        });
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Job for UpdateTask<T> {
    fn source(&self) -> &str {
        &self.source
    }

    fn is_pending(&self) -> bool {
        !self.processed.load(Ordering::Acquire)
    }

    async fn run(&self, service: &Arc<ServiceInner>) {
        service.run_tasks_for_executor(&self.executor).await;
    }

    fn discard(&self, service: &ServiceInner) {
        service.batcher.prune(&self.executor);
    }

    fn reject(&self, bus: &Bus) {
        if self.claim() {
            bus.publish(Event::new(EventKind::TaskRejected).with_source(self.source.clone()));
            isolated(bus, &self.source, "on_failure", || {
                self.listener.on_failure(&self.source, TaskFailure::Closed)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::state::ClusterState;
    use crate::tasks::{BatchResult, ExecutorFn, ListenerFn};
    use parking_lot::Mutex;

    fn noop() -> Arc<dyn ClusterStateTaskExecutor<u32>> {
        ExecutorFn::arc(|s: &Arc<ClusterState>, t: &[&u32]| {
            Ok::<_, ExecutorError>(BatchResult::builder().successes(0..t.len()).build(s.clone()))
        })
    }

    fn recording(log: Arc<Mutex<Vec<String>>>) -> TaskListenerRef {
        ListenerFn::new()
            .on_failure(move |_, f| log.lock().push(f.as_label().to_string()))
            .into_ref()
    }

    #[test]
    fn test_claim_is_exactly_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = UpdateTask::new("t".into(), 1, noop(), recording(log.clone()), None);

        assert!(task.is_pending());
        assert!(task.claim());
        assert!(!task.claim());
        assert!(!task.is_pending());

        task.reject(&Bus::new(1));
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_unclaimed_task() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = UpdateTask::new(
            "slow".into(),
            1,
            noop(),
            recording(log.clone()),
            Some(CancellationToken::new()),
        );
        task.schedule_timeout(Duration::from_millis(50), Bus::new(4));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*log.lock(), ["task_timeout"]);
        assert!(!task.claim());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_cancels_timeout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = UpdateTask::new(
            "fast".into(),
            1,
            noop(),
            recording(log.clone()),
            Some(CancellationToken::new()),
        );
        task.schedule_timeout(Duration::from_millis(50), Bus::new(4));
        assert!(task.claim());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(log.lock().is_empty());
    }
}
