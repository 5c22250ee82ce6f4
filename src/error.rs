//! Error types used by the cluster state service and its collaborators.
//!
//! - [`TaskFailure`]: why a submitted task did not complete; always delivered
//!   through the task's own listener, never returned to the submitter.
//! - [`ExecutorError`]: raised by a transition function for a whole batch or a
//!   single task of it.
//! - [`PublishError`]: the publish collaborator could not commit a new state.
//! - [`TransportError`]: connection management failures (logged, never fatal).
//! - [`NodeAckError`]: a node acknowledged a published state with an error.
//! - [`RuntimeError`]: misuse of the service lifecycle.
//!
//! All enums provide `as_label()` for logs/metrics.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Reasons a submitted task resolved without success.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskFailure {
    /// The task was still queued when its configured timeout elapsed.
    #[error("failed to process cluster event ({origin}) within {timeout:?}")]
    Timeout {
        /// Source label of the task.
        origin: Arc<str>,
        /// The configured queue timeout.
        timeout: Duration,
    },

    /// The executor only runs on the elected master and this node is not it.
    #[error("no longer master. source: [{origin}]")]
    NoLongerMaster {
        /// Source label of the task.
        origin: Arc<str>,
    },

    /// The transition function failed for this task (or for the whole batch).
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The new state could not be committed; it was not applied locally.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The executor returned no outcome for this task.
    #[error("executor returned no outcome for task [{origin}]")]
    MissingOutcome {
        /// Source label of the task.
        origin: Arc<str>,
    },

    /// The service was stopped before the task could run.
    #[error("cluster service closed")]
    Closed,
}

impl TaskFailure {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use clustervisor::TaskFailure;
    /// use std::time::Duration;
    ///
    /// let err = TaskFailure::Timeout { origin: "put-mapping".into(), timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskFailure::Timeout { .. } => "task_timeout",
            TaskFailure::NoLongerMaster { .. } => "task_no_longer_master",
            TaskFailure::Executor(_) => "task_executor_failed",
            TaskFailure::Publish(_) => "task_publish_failed",
            TaskFailure::MissingOutcome { .. } => "task_missing_outcome",
            TaskFailure::Closed => "task_closed",
        }
    }

    /// Whether the caller may legitimately retry the same request on another node.
    pub fn is_master_change(&self) -> bool {
        matches!(
            self,
            TaskFailure::NoLongerMaster { .. } | TaskFailure::Publish(_)
        )
    }
}

/// # Errors raised by a transition function.
///
/// Cloneable so one failure can be handed to every task of a batch.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The state does not allow the requested change.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Generic failure.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The transition function panicked.
    #[error("executor panicked: {0}")]
    Panicked(String),
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::IllegalState(_) => "executor_illegal_state",
            ExecutorError::Failed(_) => "executor_failed",
            ExecutorError::Panicked(_) => "executor_panicked",
        }
    }
}

/// # Errors produced by the publish collaborator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Not enough nodes accepted the new state for it to be committed.
    #[error("failed to commit cluster state version [{version}]: {reason}")]
    FailedToCommit {
        /// Version of the state that failed to commit.
        version: u64,
        /// Collaborator-provided reason.
        reason: String,
    },
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::FailedToCommit { .. } => "publish_failed_to_commit",
        }
    }
}

/// # Errors produced by the transport collaborator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connecting to a node failed.
    #[error("failed to connect to node [{node}]: {reason}")]
    ConnectFailed {
        /// Id of the target node.
        node: String,
        /// Transport-provided reason.
        reason: String,
    },

    /// The node is not connected.
    #[error("node [{node}] is not connected")]
    Disconnected {
        /// Id of the target node.
        node: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::ConnectFailed { .. } => "transport_connect_failed",
            TransportError::Disconnected { .. } => "transport_disconnected",
        }
    }
}

/// A node acknowledged a published state but failed to apply it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("node [{node}] failed to apply cluster state: {reason}")]
pub struct NodeAckError {
    /// Id of the acknowledging node.
    pub node: String,
    /// Reason reported by the node.
    pub reason: String,
}

/// # Errors produced by lifecycle calls on the service.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The call is only valid before `start()`.
    #[error("can't change initial state when already started")]
    AlreadyStarted,

    /// The call is only valid after `start()`.
    #[error("cluster service is not started")]
    NotStarted,

    /// The in-flight batch did not finish within the stop grace period.
    #[error("update worker did not stop within {grace:?}; in flight: {in_flight:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Source of the batch that was still executing, if known.
        in_flight: Option<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use clustervisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), in_flight: None };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::NotStarted => "runtime_not_started",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_converts_into_task_failure() {
        let failure: TaskFailure = ExecutorError::IllegalState("boom".into()).into();
        assert_eq!(failure.as_label(), "task_executor_failed");
        assert_eq!(failure.to_string(), "illegal state: boom");
    }

    #[test]
    fn test_master_change_classification() {
        let nlm = TaskFailure::NoLongerMaster { origin: "x".into() };
        assert!(nlm.is_master_change());

        let commit: TaskFailure = PublishError::FailedToCommit {
            version: 3,
            reason: "no quorum".into(),
        }
        .into();
        assert!(commit.is_master_change());
        assert!(!TaskFailure::Closed.is_master_change());
    }
}
