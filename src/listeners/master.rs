//! # Local master transitions.
//!
//! [`LocalNodeMasterListener`]s hear when the local node becomes or stops
//! being the elected master. The service drives them from a single internal
//! normal-tier listener that tracks the transition and spawns the callbacks on
//! the runtime, so they never run on the update worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::listeners::{ClusterStateListener, listener_key};
use crate::state::ClusterChangedEvent;

/// Callbacks for local master transitions.
pub trait LocalNodeMasterListener: Send + Sync + 'static {
    /// The local node was elected master.
    fn on_master(&self);

    /// The local node is no longer the master.
    fn off_master(&self);
}

/// Fans master transitions out to registered [`LocalNodeMasterListener`]s.
pub(crate) struct LocalNodeMasterListeners {
    listeners: RwLock<Vec<Arc<dyn LocalNodeMasterListener>>>,
    master: AtomicBool,
}

impl LocalNodeMasterListeners {
    pub(crate) fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            master: AtomicBool::new(false),
        }
    }

    pub(crate) fn add(&self, listener: Arc<dyn LocalNodeMasterListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn remove<L: ?Sized>(&self, listener: &Arc<L>) -> bool {
        let key = listener_key(listener);
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| listener_key(l) != key);
        listeners.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<dyn LocalNodeMasterListener>> {
        self.listeners.read().clone()
    }
}

impl ClusterStateListener for LocalNodeMasterListeners {
    fn cluster_changed(&self, event: &ClusterChangedEvent) {
        let is_master = event.local_node_master();
        if is_master && !self.master.swap(true, Ordering::AcqRel) {
            trace!("local node became master");
            for l in self.snapshot() {
                tokio::spawn(async move { l.on_master() });
            }
        } else if !is_master && self.master.swap(false, Ordering::AcqRel) {
            trace!("local node is no longer master");
            for l in self.snapshot() {
                tokio::spawn(async move { l.off_master() });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClusterState, Node, Nodes};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Flips {
        on: AtomicUsize,
        off: AtomicUsize,
    }

    impl LocalNodeMasterListener for Flips {
        fn on_master(&self) {
            self.on.fetch_add(1, Ordering::SeqCst);
        }

        fn off_master(&self) {
            self.off.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn state(master: bool) -> Arc<ClusterState> {
        let nodes = Nodes::builder()
            .put(Node::new("n1", "node-1", "127.0.0.1:9300"))
            .local_node_id("n1")
            .master_node_id(master.then(|| "n1".into()))
            .build();
        ClusterState::builder("test").nodes(nodes).build()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_transitions_fire_once() {
        let adapter = LocalNodeMasterListeners::new();
        let flips = Arc::new(Flips::default());
        adapter.add(flips.clone());

        let off = state(false);
        let on = state(true);
        adapter.cluster_changed(&ClusterChangedEvent::new("elect", on.clone(), off.clone()));
        adapter.cluster_changed(&ClusterChangedEvent::new("again", on.clone(), on.clone()));
        settle().await;
        assert_eq!(flips.on.load(Ordering::SeqCst), 1);

        adapter.cluster_changed(&ClusterChangedEvent::new("demote", off, on));
        settle().await;
        assert_eq!(flips.off.load(Ordering::SeqCst), 1);

        assert!(adapter.remove(&flips));
        assert!(!adapter.remove(&flips));
    }
}
