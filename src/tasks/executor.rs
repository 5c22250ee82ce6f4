//! # Transition functions and their batch results.
//!
//! A [`ClusterStateTaskExecutor`] turns the current state plus a batch of task
//! payloads into a candidate state and one [`TaskResult`] per payload.
//!
//! ## Rules
//! - Executors are pure: same input, same output, no hidden state mutation.
//! - Outcomes are keyed by the payload's position in the `tasks` slice. Every
//!   position must receive an outcome.
//! - Returning the **same** `Arc` as `current` means "no change"; nothing is
//!   published in that case.
//! - Returning `Err` fails every task of the batch with that error.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use clustervisor::{BatchResult, ClusterState, ClusterStateTaskExecutor, ExecutorError, ExecutorFn};
//!
//! let noop: Arc<dyn ClusterStateTaskExecutor<u32>> = ExecutorFn::arc(
//!     |state: &Arc<ClusterState>, tasks: &[&u32]| {
//!         Ok::<_, ExecutorError>(BatchResult::builder().successes(0..tasks.len()).build(state.clone()))
//!     },
//! );
//! assert!(noop.run_only_on_master());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExecutorError;
use crate::state::ClusterState;

/// Outcome of one task inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskResult {
    Success,
    Failure(ExecutorError),
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success)
    }
}

/// Candidate state plus per-task outcomes produced by one executor call.
#[derive(Clone, Debug)]
pub struct BatchResult {
    resulting_state: Arc<ClusterState>,
    outcomes: HashMap<usize, TaskResult>,
}

impl BatchResult {
    pub fn builder() -> BatchResultBuilder {
        BatchResultBuilder::default()
    }

    /// Batch where every one of `count` tasks failed with `error` and the state is unchanged.
    pub(crate) fn failed_all(
        state: Arc<ClusterState>,
        count: usize,
        error: ExecutorError,
    ) -> Self {
        BatchResult::builder()
            .failures(0..count, error)
            .build(state)
    }

    pub fn resulting_state(&self) -> &Arc<ClusterState> {
        &self.resulting_state
    }

    /// Outcome for the task at `index` of the input slice.
    pub fn outcome(&self, index: usize) -> Option<&TaskResult> {
        self.outcomes.get(&index)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Builder for [`BatchResult`].
#[derive(Default)]
pub struct BatchResultBuilder {
    outcomes: HashMap<usize, TaskResult>,
}

impl BatchResultBuilder {
    pub fn success(mut self, index: usize) -> Self {
        self.outcomes.insert(index, TaskResult::Success);
        self
    }

    pub fn successes(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        for i in indices {
            self.outcomes.insert(i, TaskResult::Success);
        }
        self
    }

    pub fn failure(mut self, index: usize, error: ExecutorError) -> Self {
        self.outcomes.insert(index, TaskResult::Failure(error));
        self
    }

    pub fn failures(mut self, indices: impl IntoIterator<Item = usize>, error: ExecutorError) -> Self {
        for i in indices {
            self.outcomes.insert(i, TaskResult::Failure(error.clone()));
        }
        self
    }

    pub fn build(self, resulting_state: Arc<ClusterState>) -> BatchResult {
        BatchResult {
            resulting_state,
            outcomes: self.outcomes,
        }
    }
}

/// # Transition function for a batch of tasks of payload type `T`.
///
/// Tasks are batched by executor **identity**: every submission that passes a
/// clone of the same `Arc<dyn ClusterStateTaskExecutor<T>>` may end up in the
/// same call.
pub trait ClusterStateTaskExecutor<T>: Send + Sync + 'static {
    /// Computes the next state for `tasks`, in submission order.
    fn execute(
        &self,
        current: &Arc<ClusterState>,
        tasks: &[&T],
    ) -> Result<BatchResult, ExecutorError>;

    /// Whether the batch may only run on the elected master.
    fn run_only_on_master(&self) -> bool {
        true
    }
}

/// Closure-backed executor.
pub struct ExecutorFn<F> {
    f: F,
    master_only: bool,
}

impl<F> ExecutorFn<F> {
    /// Creates a master-only executor.
    pub fn new(f: F) -> Self {
        Self {
            f,
            master_only: true,
        }
    }

    /// Creates the executor and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }

    /// Creates an executor that also runs on non-master nodes.
    pub fn arc_any_node(f: F) -> Arc<Self> {
        Arc::new(Self {
            f,
            master_only: false,
        })
    }
}

impl<T, F> ClusterStateTaskExecutor<T> for ExecutorFn<F>
where
    T: 'static,
    F: Fn(&Arc<ClusterState>, &[&T]) -> Result<BatchResult, ExecutorError> + Send + Sync + 'static,
{
    fn execute(
        &self,
        current: &Arc<ClusterState>,
        tasks: &[&T],
    ) -> Result<BatchResult, ExecutorError> {
        (self.f)(current, tasks)
    }

    fn run_only_on_master(&self) -> bool {
        self.master_only
    }
}
