//! # Per-executor batcher.
//!
//! Pending tasks are filed under the identity of their executor. When any task
//! of an executor reaches the head of the queue, the whole list is taken and
//! every still-unclaimed task in it joins the batch.
//!
//! Lists of different payload types share one map, so the key also carries the
//! payload's `TypeId`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::queue::Job;
use crate::core::task::UpdateTask;
use crate::tasks::ClusterStateTaskExecutor;

type BatchKey = (TypeId, usize);

fn batch_key<T: 'static>(executor: &Arc<dyn ClusterStateTaskExecutor<T>>) -> BatchKey {
    (
        TypeId::of::<T>(),
        Arc::as_ptr(executor) as *const () as usize,
    )
}

pub(crate) struct Batcher {
    tasks: Mutex<HashMap<BatchKey, Box<dyn Any + Send + Sync>>>,
}

impl Batcher {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Files `task` under its executor, in submission order.
    pub(crate) fn add<T: Send + Sync + 'static>(&self, task: Arc<UpdateTask<T>>) {
        let key = batch_key(task.executor());
        let mut map = self.tasks.lock();
        let slot = map
            .entry(key)
            .or_insert_with(|| Box::new(Vec::<Arc<UpdateTask<T>>>::new()));
        if let Some(list) = slot.downcast_mut::<Vec<Arc<UpdateTask<T>>>>() {
            list.push(task);
        }
    }

    /// Takes every task filed under `executor` and returns the ones this call claimed.
    pub(crate) fn drain_and_claim<T: Send + Sync + 'static>(
        &self,
        executor: &Arc<dyn ClusterStateTaskExecutor<T>>,
    ) -> Vec<Arc<UpdateTask<T>>> {
        let taken = self.tasks.lock().remove(&batch_key(executor));
        let Some(boxed) = taken else {
            return Vec::new();
        };
        match boxed.downcast::<Vec<Arc<UpdateTask<T>>>>() {
            Ok(list) => list.into_iter().filter(|t| t.claim()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Drops resolved tasks filed under `executor`, and the list once it is empty.
    pub(crate) fn prune<T: Send + Sync + 'static>(
        &self,
        executor: &Arc<dyn ClusterStateTaskExecutor<T>>,
    ) {
        let key = batch_key(executor);
        let mut map = self.tasks.lock();
        let Some(list) = map
            .get_mut(&key)
            .and_then(|slot| slot.downcast_mut::<Vec<Arc<UpdateTask<T>>>>())
        else {
            return;
        };
        list.retain(|t| t.is_pending());
        if list.is_empty() {
            map.remove(&key);
        }
    }

    /// Drops every filed list; the tasks themselves are resolved through the queue.
    pub(crate) fn clear(&self) {
        self.tasks.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn executor_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::state::ClusterState;
    use crate::tasks::{BatchResult, ExecutorFn, ListenerFn};

    fn exec<T: Send + Sync + 'static>() -> Arc<dyn ClusterStateTaskExecutor<T>> {
        ExecutorFn::arc(|s: &Arc<ClusterState>, t: &[&T]| {
            Ok::<_, ExecutorError>(BatchResult::builder().successes(0..t.len()).build(s.clone()))
        })
    }

    fn task<T: Send + Sync + 'static>(
        source: &str,
        payload: T,
        executor: &Arc<dyn ClusterStateTaskExecutor<T>>,
    ) -> Arc<UpdateTask<T>> {
        UpdateTask::new(
            source.into(),
            payload,
            executor.clone(),
            ListenerFn::new().into_ref(),
            None,
        )
    }

    #[test]
    fn test_drains_only_its_executor_and_skips_claimed() {
        let batcher = Batcher::new();
        let a = exec::<u32>();
        let b = exec::<u32>();

        let a1 = task("a1", 1, &a);
        let a2 = task("a2", 2, &a);
        let a3 = task("a3", 3, &a);
        batcher.add(a1.clone());
        batcher.add(a2.clone());
        batcher.add(a3.clone());
        batcher.add(task("b1", 10, &b));
        assert!(a2.claim());

        let batch = batcher.drain_and_claim(&a);
        let payloads: Vec<u32> = batch.iter().map(|t| *t.payload()).collect();
        assert_eq!(payloads, [1, 3]);
        assert!(batcher.drain_and_claim(&a).is_empty());
        assert_eq!(batcher.executor_count(), 1);
    }

    #[test]
    fn test_payload_types_do_not_mix() {
        let batcher = Batcher::new();
        let nums = exec::<u32>();
        let names = exec::<String>();
        batcher.add(task("n", 1, &nums));
        batcher.add(task("s", "x".to_string(), &names));

        assert_eq!(batcher.drain_and_claim(&names).len(), 1);
        assert_eq!(batcher.drain_and_claim(&nums).len(), 1);

        batcher.add(task("n", 2, &nums));
        batcher.clear();
        assert_eq!(batcher.executor_count(), 0);
    }

    #[test]
    fn test_prune_drops_resolved_tasks() {
        let batcher = Batcher::new();
        let a = exec::<u32>();
        let a1 = task("a1", 1, &a);
        let a2 = task("a2", 2, &a);
        batcher.add(a1.clone());
        batcher.add(a2.clone());

        assert!(a1.claim());
        batcher.prune(&a);
        assert_eq!(batcher.executor_count(), 1);

        assert!(a2.claim());
        batcher.prune(&a);
        assert_eq!(batcher.executor_count(), 0);
        batcher.prune(&a);
    }
}
