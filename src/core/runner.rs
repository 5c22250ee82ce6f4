//! # State transition runner.
//!
//! Runs one batch: everything pending for one executor.
//!
//! ## Flow
//! ```text
//! drain & claim batch ──► empty? ──► return
//!        │
//!        ├─ service not started ──────────────► on_failure(Closed) for all
//!        ├─ not master && master-only ────────► on_no_longer_master for all
//!        ▼
//! executor.execute(state, payloads)   (panics caught)
//!        │
//!        ├─ Err / panic ──► every task fails, state unchanged
//!        ▼
//! per-task outcome ──► failures: on_failure(Executor)
//!        │
//!        ├─ same Arc ──► acked: on_all_nodes_acked(None); cluster_state_processed(S, S)
//!        ▼
//! master: version+1, sub-versions+1 on identity change, ack trackers
//! status = BeingApplied, log delta, connect added nodes
//! master: publish ──► Err ──► on_failure(Publish) for all, keep previous state
//! swap current ──► First / Normal / Last ──► disconnect removed nodes
//! status = Applied ──► PostApplied ──► master self-ack ──► cluster_state_processed(prev, new)
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::core::ack::{AckCountDown, DelegatingAckListener};
use crate::core::service::ServiceInner;
use crate::core::task::UpdateTask;
use crate::discovery::AckListener;
use crate::error::{ExecutorError, TaskFailure};
use crate::events::{Event, EventKind};
use crate::listeners::{ListenerTier, isolated};
use crate::state::{ClusterChangedEvent, ClusterState, ClusterStateStatus};
use crate::subscribers::panic_message;
use crate::tasks::{BatchResult, ClusterStateTaskExecutor, TaskResult};

/// Calls the executor, turning `Err` and panics into a batch where every task failed.
fn execute_batch<T>(
    executor: &Arc<dyn ClusterStateTaskExecutor<T>>,
    previous: &Arc<ClusterState>,
    batch: &[Arc<UpdateTask<T>>],
) -> Result<BatchResult, ExecutorError>
where
    T: Send + Sync + 'static,
{
    let payloads: Vec<&T> = batch.iter().map(|t| t.payload()).collect();
    match catch_unwind(AssertUnwindSafe(|| executor.execute(previous, &payloads))) {
        Ok(res) => res,
        Err(panic_err) => Err(ExecutorError::Panicked(panic_message(&*panic_err))),
    }
}

impl ServiceInner {
    pub(crate) async fn run_tasks_for_executor<T>(
        &self,
        executor: &Arc<dyn ClusterStateTaskExecutor<T>>,
    ) where
        T: Send + Sync + 'static,
    {
        let batch = self.batcher.drain_and_claim(executor);
        if batch.is_empty() {
            return;
        }
        let source = batch
            .iter()
            .map(|t| t.source())
            .collect::<Vec<_>>()
            .join(", ");

        if !self.lifecycle.is_started() {
            debug!("processing [{source}]: ignoring, cluster service not started");
            for t in &batch {
                self.bus
                    .publish(Event::new(EventKind::TaskRejected).with_source(t.source()));
                isolated(&self.bus, t.source(), "on_failure", || {
                    t.listener().on_failure(t.source(), TaskFailure::Closed)
                });
            }
            return;
        }
        debug!("processing [{source}]: execute");

        let previous = self.state.load_full();
        if !previous.nodes().local_node_master() && executor.run_only_on_master() {
            debug!("failing [{source}]: local node is no longer master");
            self.bus
                .publish(Event::new(EventKind::NoLongerMaster).with_source(source.as_str()));
            for t in &batch {
                isolated(&self.bus, t.source(), "on_no_longer_master", || {
                    t.listener().on_no_longer_master(t.source())
                });
            }
            return;
        }

        let started = Instant::now();
        let (result, executor_failed) = match execute_batch(executor, &previous, &batch) {
            Ok(result) => (result, false),
            Err(err) => {
                let took = started.elapsed();
                warn!(
                    version = previous.version(),
                    "failed to execute cluster state update in {took:?}, source [{source}]: {err}"
                );
                trace!("current state:\n{previous}");
                self.bus.publish(
                    Event::new(EventKind::ExecutorFailed)
                        .with_source(source.as_str())
                        .with_version(previous.version())
                        .with_reason(err.to_string())
                        .with_took(took),
                );
                (
                    BatchResult::failed_all(previous.clone(), batch.len(), err),
                    true,
                )
            }
        };

        let mut processed: Vec<&Arc<UpdateTask<T>>> = Vec::with_capacity(batch.len());
        for (idx, task) in batch.iter().enumerate() {
            debug_assert!(
                result.outcome(idx).is_some(),
                "missing outcome for task [{}]",
                task.source()
            );
            match result.outcome(idx) {
                Some(TaskResult::Success) => processed.push(task),
                Some(TaskResult::Failure(err)) => {
                    debug!("cluster state update task [{}] failed: {err}", task.source());
                    isolated(&self.bus, task.source(), "on_failure", || {
                        task.listener()
                            .on_failure(task.source(), TaskFailure::Executor(err.clone()))
                    });
                }
                None => {
                    warn!("executor returned no outcome for task [{}]", task.source());
                    isolated(&self.bus, task.source(), "on_failure", || {
                        task.listener().on_failure(
                            task.source(),
                            TaskFailure::MissingOutcome {
                                origin: task.source().into(),
                            },
                        )
                    });
                }
            }
        }

        let resulting = result.resulting_state().clone();
        if Arc::ptr_eq(&previous, &resulting) {
            for task in &processed {
                if let Some(acked) = task.listener().as_acked() {
                    isolated(&self.bus, task.source(), "on_all_nodes_acked", || {
                        acked.on_all_nodes_acked(None)
                    });
                }
                isolated(&self.bus, task.source(), "cluster_state_processed", || {
                    task.listener()
                        .cluster_state_processed(task.source(), &previous, &previous)
                });
            }
            let took = started.elapsed();
            debug!("processing [{source}]: took {took:?} no change in cluster_state");
            if !executor_failed {
                self.bus.publish(
                    Event::new(EventKind::StateUnchanged)
                        .with_source(source.as_str())
                        .with_version(previous.version())
                        .with_took(took),
                );
            }
            self.warn_about_slow_task(&source, took);
            return;
        }

        let new_state = if resulting.nodes().local_node_master() {
            next_master_version(&previous, &resulting)
        } else {
            resulting
        };
        let is_master = new_state.nodes().local_node_master();

        let mut trackers = Vec::new();
        if is_master {
            for task in &processed {
                let Some(acked) = task.listener().as_acked() else {
                    continue;
                };
                match acked.ack_timeout().filter(|d| *d > Duration::ZERO) {
                    None => {
                        isolated(&self.bus, task.source(), "on_ack_timeout", || {
                            acked.on_ack_timeout()
                        });
                    }
                    Some(timeout) => trackers.push(AckCountDown::start(
                        &self.ack_trackers,
                        task.source().into(),
                        Arc::clone(acked),
                        new_state.version(),
                        new_state.nodes(),
                        timeout,
                        self.bus.clone(),
                    )),
                }
            }
        }
        let ack_listener = Arc::new(DelegatingAckListener::new(trackers));

        new_state.set_status(ClusterStateStatus::BeingApplied);
        trace!("cluster state updated, source [{source}]\n{new_state}");
        debug!(
            "cluster state updated, version [{}], source [{source}]",
            new_state.version()
        );

        let event = ClusterChangedEvent::new(source.as_str(), new_state.clone(), previous.clone());
        let delta = event.nodes_delta();
        if delta.has_changes() {
            info!("{}, reason: {source}", delta.short_summary());
        }

        let local = new_state.nodes().local_node().cloned();
        for node in delta.added_nodes() {
            if local.as_ref().is_some_and(|l| !l.should_connect_to(node)) {
                continue;
            }
            if let Err(err) = self.transport.connect_to_node(node).await {
                warn!(node = %node, "failed to connect to node: {err}");
            }
        }

        if is_master {
            debug!(
                "publishing cluster state version [{}]",
                new_state.version()
            );
            let publish = self
                .publisher
                .publish(&event, Arc::clone(&ack_listener) as Arc<dyn AckListener>)
                .await;
            if let Err(err) = publish {
                warn!(
                    version = new_state.version(),
                    "failing [{source}]: failed to commit cluster state: {err}"
                );
                ack_listener.abandon_all();
                self.bus.publish(
                    Event::new(EventKind::PublishFailed)
                        .with_source(source.as_str())
                        .with_version(new_state.version())
                        .with_reason(err.to_string()),
                );
                for task in &processed {
                    isolated(&self.bus, task.source(), "on_failure", || {
                        task.listener()
                            .on_failure(task.source(), TaskFailure::Publish(err.clone()))
                    });
                }
                return;
            }
        }

        self.state.store(new_state.clone());
        for tier in ListenerTier::PRE_APPLIED {
            self.listeners.notify(tier, &event);
        }

        for node in delta.removed_nodes() {
            if let Err(err) = self.transport.disconnect_from_node(node).await {
                debug!(node = %node, "failed to disconnect from node: {err}");
            }
        }

        new_state.set_status(ClusterStateStatus::Applied);
        self.listeners.notify(ListenerTier::PostApplied, &event);

        if is_master {
            if let Some(local) = &local {
                ack_listener.on_node_ack(local, None);
            }
        }

        for task in &processed {
            isolated(&self.bus, task.source(), "cluster_state_processed", || {
                task.listener()
                    .cluster_state_processed(task.source(), &previous, &new_state)
            });
        }

        let took = started.elapsed();
        debug!(
            "processing [{source}]: took {took:?} done applying updated cluster_state (version: {}, uuid: {})",
            new_state.version(),
            new_state.state_uuid()
        );
        self.bus.publish(
            Event::new(EventKind::StateApplied)
                .with_source(source.as_str())
                .with_version(new_state.version())
                .with_took(took),
        );
        self.warn_about_slow_task(&source, took);
    }

    fn warn_about_slow_task(&self, source: &str, took: Duration) {
        let threshold = self.slow_task_logging_threshold();
        if took > threshold {
            warn!("cluster state update task [{source}] took {took:?} above the warn threshold of {threshold:?}");
            self.bus.publish(
                Event::new(EventKind::SlowTask)
                    .with_source(source)
                    .with_took(took),
            );
        }
    }
}

/// Stamps a master-produced state: version + 1 (fresh uuid), and routing table /
/// metadata versions + 1 when their identity changed.
fn next_master_version(previous: &ClusterState, resulting: &Arc<ClusterState>) -> Arc<ClusterState> {
    let mut builder = ClusterState::builder_from(resulting).increment_version();
    if !Arc::ptr_eq(previous.routing_table(), resulting.routing_table()) {
        let rt = resulting.routing_table();
        builder = builder.routing_table(rt.with_version(rt.version() + 1));
    }
    if !Arc::ptr_eq(previous.metadata(), resulting.metadata()) {
        let md = resulting.metadata();
        builder = builder.metadata(md.with_version(md.version() + 1));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{IndexMetaData, MetaData, RoutingTable};

    #[test]
    fn test_sub_versions_move_only_on_identity_change() {
        let previous = ClusterState::builder("test").build();

        let same_parts = ClusterState::builder_from(&previous).build();
        let next = next_master_version(&previous, &same_parts);
        assert_eq!(next.version(), previous.version() + 1);
        assert_ne!(next.state_uuid(), same_parts.state_uuid());
        assert_eq!(next.routing_table().version(), 0);
        assert_eq!(next.metadata().version(), 0);

        let changed = ClusterState::builder_from(&previous)
            .routing_table(RoutingTable::default())
            .metadata(MetaData::default().with_index(IndexMetaData {
                name: "logs".into(),
                number_of_shards: 1,
                number_of_replicas: 0,
            }))
            .build();
        let next = next_master_version(&previous, &changed);
        assert_eq!(next.routing_table().version(), 1);
        assert_eq!(next.metadata().version(), 1);
    }
}
