//! # Per-task completion listeners.
//!
//! Every submitted task resolves **exactly once** through its listener:
//! - [`TaskListener::cluster_state_processed`] on success,
//! - [`TaskListener::on_failure`] with a [`TaskFailure`],
//! - [`TaskListener::on_no_longer_master`] when a master-only batch reached a non-master node.
//!
//! Listeners that also need to know when the cluster confirmed a published
//! state implement [`AckedTaskListener`]. The two capabilities are carried by
//! the tagged [`TaskListenerRef`] so the pipeline never has to downcast.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{NodeAckError, TaskFailure};
use crate::state::{ClusterState, Node};

/// Completion callbacks of a submitted task.
///
/// Called from the update worker (or a timer task for timeouts); keep them short.
pub trait TaskListener: Send + Sync + 'static {
    /// The task failed, timed out, or the service was closed.
    fn on_failure(&self, source: &str, failure: TaskFailure);

    /// The task requires the master and this node is not it.
    fn on_no_longer_master(&self, source: &str) {
        self.on_failure(
            source,
            TaskFailure::NoLongerMaster {
                origin: source.into(),
            },
        );
    }

    /// The batch containing this task was applied (`old` and `new` may be the same `Arc`).
    fn cluster_state_processed(
        &self,
        _source: &str,
        _old: &Arc<ClusterState>,
        _new: &Arc<ClusterState>,
    ) {
    }
}

/// Listener that waits for nodes to acknowledge the published state.
pub trait AckedTaskListener: TaskListener {
    /// Whether `node` has to acknowledge. The master always does.
    fn must_ack(&self, _node: &Node) -> bool {
        true
    }

    /// Maximum wait for acknowledgements; `None`/zero resolves with
    /// [`on_ack_timeout`](Self::on_ack_timeout) right away.
    fn ack_timeout(&self) -> Option<Duration>;

    /// Every required node acknowledged; carries the last reported node failure.
    fn on_all_nodes_acked(&self, failure: Option<NodeAckError>);

    /// The ack timeout elapsed first.
    fn on_ack_timeout(&self);

    /// The service stopped while acknowledgements were outstanding.
    fn on_ack_closed(&self) {
        self.on_ack_timeout();
    }
}

/// Tagged listener handle accepted by `submit_state_update_task`.
#[derive(Clone)]
pub enum TaskListenerRef {
    Plain(Arc<dyn TaskListener>),
    Acked(Arc<dyn AckedTaskListener>),
}

impl TaskListenerRef {
    pub fn plain<L: TaskListener>(listener: Arc<L>) -> Self {
        TaskListenerRef::Plain(listener)
    }

    pub fn acked<L: AckedTaskListener>(listener: Arc<L>) -> Self {
        TaskListenerRef::Acked(listener)
    }

    /// Returns the ack capability, if any.
    pub fn as_acked(&self) -> Option<&Arc<dyn AckedTaskListener>> {
        match self {
            TaskListenerRef::Plain(_) => None,
            TaskListenerRef::Acked(l) => Some(l),
        }
    }

    pub(crate) fn on_failure(&self, source: &str, failure: TaskFailure) {
        match self {
            TaskListenerRef::Plain(l) => l.on_failure(source, failure),
            TaskListenerRef::Acked(l) => l.on_failure(source, failure),
        }
    }

    pub(crate) fn on_no_longer_master(&self, source: &str) {
        match self {
            TaskListenerRef::Plain(l) => l.on_no_longer_master(source),
            TaskListenerRef::Acked(l) => l.on_no_longer_master(source),
        }
    }

    pub(crate) fn cluster_state_processed(
        &self,
        source: &str,
        old: &Arc<ClusterState>,
        new: &Arc<ClusterState>,
    ) {
        match self {
            TaskListenerRef::Plain(l) => l.cluster_state_processed(source, old, new),
            TaskListenerRef::Acked(l) => l.cluster_state_processed(source, old, new),
        }
    }
}

impl From<Arc<dyn TaskListener>> for TaskListenerRef {
    fn from(listener: Arc<dyn TaskListener>) -> Self {
        TaskListenerRef::Plain(listener)
    }
}

impl From<Arc<dyn AckedTaskListener>> for TaskListenerRef {
    fn from(listener: Arc<dyn AckedTaskListener>) -> Self {
        TaskListenerRef::Acked(listener)
    }
}
