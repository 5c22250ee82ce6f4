//! # Self-contained update tasks.
//!
//! A [`ClusterStateUpdateTask`] is its own executor, configuration and
//! listener. Each submission gets a private executor, so it always runs in a
//! batch of one.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ExecutorError;
use crate::state::ClusterState;
use crate::tasks::{BatchResult, ClusterStateTaskExecutor, Priority, TaskConfig, TaskListener};

/// Single-shot state update with its own completion callbacks.
pub trait ClusterStateUpdateTask: TaskListener {
    /// Computes the new state; return `current` itself for "no change".
    fn execute(&self, current: &Arc<ClusterState>) -> Result<Arc<ClusterState>, ExecutorError>;

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Maximum time to wait in the queue.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn run_only_on_master(&self) -> bool {
        true
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::new(self.priority(), self.timeout())
    }
}

/// Adapts one [`ClusterStateUpdateTask`] to the batch executor contract.
pub(crate) struct UpdateTaskExecutor<U: ?Sized> {
    task: Arc<U>,
}

impl<U: ClusterStateUpdateTask + ?Sized> UpdateTaskExecutor<U> {
    pub(crate) fn new(task: Arc<U>) -> Self {
        Self { task }
    }
}

impl<U: ClusterStateUpdateTask + ?Sized> ClusterStateTaskExecutor<()> for UpdateTaskExecutor<U> {
    fn execute(
        &self,
        current: &Arc<ClusterState>,
        tasks: &[&()],
    ) -> Result<BatchResult, ExecutorError> {
        let next = self.task.execute(current)?;
        Ok(BatchResult::builder().successes(0..tasks.len()).build(next))
    }

    fn run_only_on_master(&self) -> bool {
        self.task.run_only_on_master()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFailure;

    struct Bump;

    impl TaskListener for Bump {
        fn on_failure(&self, _source: &str, _failure: TaskFailure) {}
    }

    impl ClusterStateUpdateTask for Bump {
        fn execute(&self, current: &Arc<ClusterState>) -> Result<Arc<ClusterState>, ExecutorError> {
            Ok(ClusterState::builder_from(current).build())
        }

        fn priority(&self) -> Priority {
            Priority::Urgent
        }
    }

    #[test]
    fn test_adapter_marks_single_task_successful() {
        let exec = UpdateTaskExecutor::new(Arc::new(Bump));
        let state = ClusterState::builder("test").build();

        let res = exec.execute(&state, &[&()]).unwrap();
        assert_eq!(res.len(), 1);
        assert!(!Arc::ptr_eq(res.resulting_state(), &state));
        assert!(ClusterStateTaskExecutor::<()>::run_only_on_master(&exec));
        assert_eq!(Bump.config().priority(), Priority::Urgent);
    }
}
