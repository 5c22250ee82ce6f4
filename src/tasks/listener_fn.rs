//! # Closure-backed task listeners.
//!
//! [`ListenerFn`] and [`AckedListenerFn`] assemble a listener from optional
//! closures, so callers do not need a dedicated type per call site.
//! Unset callbacks fall back to a `debug!` line.
//!
//! ## Example
//! ```rust
//! use clustervisor::{ListenerFn, TaskListenerRef};
//!
//! let listener: TaskListenerRef = ListenerFn::new()
//!     .on_processed(|source, _old, new| println!("[{source}] now at v{}", new.version()))
//!     .on_failure(|source, err| eprintln!("[{source}] failed: {err}"))
//!     .into_ref();
//! # let _ = listener;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{NodeAckError, TaskFailure};
use crate::state::{ClusterState, Node};
use crate::tasks::{AckedTaskListener, TaskListener, TaskListenerRef};

type ProcessedFn = Box<dyn Fn(&str, &Arc<ClusterState>, &Arc<ClusterState>) + Send + Sync>;
type FailureFn = Box<dyn Fn(&str, TaskFailure) + Send + Sync>;
type SourceFn = Box<dyn Fn(&str) + Send + Sync>;

/// Function-backed [`TaskListener`].
#[derive(Default)]
pub struct ListenerFn {
    processed: Option<ProcessedFn>,
    failure: Option<FailureFn>,
    no_longer_master: Option<SourceFn>,
}

impl ListenerFn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_processed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Arc<ClusterState>, &Arc<ClusterState>) + Send + Sync + 'static,
    {
        self.processed = Some(Box::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, TaskFailure) + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(f));
        self
    }

    /// Overrides the default "forward to `on_failure`" behaviour.
    pub fn on_no_longer_master<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.no_longer_master = Some(Box::new(f));
        self
    }

    pub fn into_ref(self) -> TaskListenerRef {
        TaskListenerRef::plain(Arc::new(self))
    }
}

impl TaskListener for ListenerFn {
    fn on_failure(&self, source: &str, failure: TaskFailure) {
        match &self.failure {
            Some(f) => f(source, failure),
            None => debug!(source, error = %failure, "cluster state task failed"),
        }
    }

    fn on_no_longer_master(&self, source: &str) {
        match &self.no_longer_master {
            Some(f) => f(source),
            None => TaskListener::on_failure(
                self,
                source,
                TaskFailure::NoLongerMaster {
                    origin: source.into(),
                },
            ),
        }
    }

    fn cluster_state_processed(
        &self,
        source: &str,
        old: &Arc<ClusterState>,
        new: &Arc<ClusterState>,
    ) {
        if let Some(f) = &self.processed {
            f(source, old, new);
        }
    }
}

type MustAckFn = Box<dyn Fn(&Node) -> bool + Send + Sync>;
type AllAckedFn = Box<dyn Fn(Option<NodeAckError>) + Send + Sync>;
type UnitFn = Box<dyn Fn() + Send + Sync>;

/// Function-backed [`AckedTaskListener`].
pub struct AckedListenerFn {
    inner: ListenerFn,
    ack_timeout: Option<Duration>,
    must_ack: Option<MustAckFn>,
    all_acked: Option<AllAckedFn>,
    ack_timed_out: Option<UnitFn>,
    ack_closed: Option<UnitFn>,
}

impl AckedListenerFn {
    /// Wraps `inner` with an ack timeout (`None` = resolve as timed out immediately).
    pub fn new(inner: ListenerFn, ack_timeout: Option<Duration>) -> Self {
        Self {
            inner,
            ack_timeout,
            must_ack: None,
            all_acked: None,
            ack_timed_out: None,
            ack_closed: None,
        }
    }

    pub fn must_ack<F>(mut self, f: F) -> Self
    where
        F: Fn(&Node) -> bool + Send + Sync + 'static,
    {
        self.must_ack = Some(Box::new(f));
        self
    }

    pub fn on_all_nodes_acked<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<NodeAckError>) + Send + Sync + 'static,
    {
        self.all_acked = Some(Box::new(f));
        self
    }

    pub fn on_ack_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ack_timed_out = Some(Box::new(f));
        self
    }

    pub fn on_ack_closed<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ack_closed = Some(Box::new(f));
        self
    }

    pub fn into_ref(self) -> TaskListenerRef {
        TaskListenerRef::acked(Arc::new(self))
    }
}

impl TaskListener for AckedListenerFn {
    fn on_failure(&self, source: &str, failure: TaskFailure) {
        TaskListener::on_failure(&self.inner, source, failure);
    }

    fn on_no_longer_master(&self, source: &str) {
        TaskListener::on_no_longer_master(&self.inner, source);
    }

    fn cluster_state_processed(
        &self,
        source: &str,
        old: &Arc<ClusterState>,
        new: &Arc<ClusterState>,
    ) {
        TaskListener::cluster_state_processed(&self.inner, source, old, new);
    }
}

impl AckedTaskListener for AckedListenerFn {
    fn must_ack(&self, node: &Node) -> bool {
        self.must_ack.as_ref().is_none_or(|f| f(node))
    }

    fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout
    }

    fn on_all_nodes_acked(&self, failure: Option<NodeAckError>) {
        match &self.all_acked {
            Some(f) => f(failure),
            None => debug!(?failure, "all nodes acknowledged cluster state"),
        }
    }

    fn on_ack_timeout(&self) {
        match &self.ack_timed_out {
            Some(f) => f(),
            None => debug!("timed out waiting for cluster state acknowledgements"),
        }
    }

    fn on_ack_closed(&self) {
        match &self.ack_closed {
            Some(f) => f(),
            None => AckedTaskListener::on_ack_timeout(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_no_longer_master_falls_back_to_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let listener = ListenerFn::new().on_failure(move |_, err| {
            assert!(matches!(err, TaskFailure::NoLongerMaster { .. }));
            h.fetch_add(1, Ordering::SeqCst);
        });

        TaskListener::on_no_longer_master(&listener, "reroute");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ack_closed_defaults_to_ack_timeout() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let listener = AckedListenerFn::new(ListenerFn::new(), Some(Duration::from_secs(1)))
            .on_ack_timeout(move || {
                h.fetch_add(1, Ordering::SeqCst);
            });

        AckedTaskListener::on_ack_closed(&listener);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(AckedTaskListener::must_ack(&listener, &Node::new("a", "a", "local")));
    }
}
