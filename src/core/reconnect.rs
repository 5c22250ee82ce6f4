//! # Node reachability reconciler.
//!
//! Runs beside the update worker and never goes through the queue. Every
//! `reconnect_interval` it walks the nodes of the current state and reconnects
//! the ones the transport reports as disconnected.
//!
//! ## Rules
//! - Only nodes the local node should connect to are considered (never itself,
//!   never client to client).
//! - A failure counts only if the node is still part of the current state.
//! - Every Nth consecutive failure of a node is logged and published as
//!   `NodeReconnectFailed`, then its counter restarts.
//! - Counters of nodes that left the state are purged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::events::{Bus, Event, EventKind};
use crate::state::ClusterState;
use crate::transport::Transport;

pub(crate) struct ReconnectToNodes {
    state: Arc<ArcSwap<ClusterState>>,
    transport: Arc<dyn Transport>,
    bus: Bus,
    log_every: u32,
    failures: HashMap<Arc<str>, u32>,
}

impl ReconnectToNodes {
    pub(crate) fn new(
        state: Arc<ArcSwap<ClusterState>>,
        transport: Arc<dyn Transport>,
        bus: Bus,
        log_every: u32,
    ) -> Self {
        Self {
            state,
            transport,
            bus,
            log_every: log_every.max(1),
            failures: HashMap::new(),
        }
    }

    /// Reconciles every `interval` until `token` is cancelled.
    pub(crate) async fn run(mut self, interval: Duration, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if token.is_cancelled() {
                break;
            }
            self.reconcile_once().await;
        }
    }

    /// One pass over the current state.
    pub(crate) async fn reconcile_once(&mut self) {
        let snapshot = self.state.load_full();
        let local = snapshot.nodes().local_node().cloned();

        for node in snapshot.nodes().iter() {
            if let Some(local) = &local {
                if !local.should_connect_to(node) {
                    continue;
                }
            }
            if !self.state.load().nodes().node_exists(node.id()) {
                continue;
            }
            if self.transport.is_connected(node) {
                continue;
            }

            match self.transport.connect_to_node(node).await {
                Ok(()) => {
                    trace!(node = %node, "reconnected");
                    self.failures.remove(node.id());
                }
                Err(err) => {
                    if !self.state.load().nodes().node_exists(node.id()) {
                        continue;
                    }
                    let count = self.failures.entry(Arc::from(node.id())).or_insert(0);
                    *count += 1;
                    if *count % self.log_every == 0 {
                        warn!(node = %node, "failed to reconnect to node: {err}");
                        self.bus.publish(
                            Event::new(EventKind::NodeReconnectFailed)
                                .with_node(node.id())
                                .with_reason(err.to_string()),
                        );
                        *count = 0;
                    }
                }
            }
        }

        let current = self.state.load();
        self.failures
            .retain(|id, _| current.nodes().node_exists(id));
    }

    #[cfg(test)]
    fn failure_count(&self, id: &str) -> Option<u32> {
        self.failures.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::state::{Node, Nodes};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Refuses every connection.
    #[derive(Default)]
    struct DownTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for DownTransport {
        async fn connect_to_node(&self, node: &Node) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::ConnectFailed {
                node: node.id().to_string(),
                reason: "connection refused".into(),
            })
        }

        async fn disconnect_from_node(&self, _node: &Node) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_connected(&self, _node: &Node) -> bool {
            false
        }
    }

    fn state(with_peer: bool) -> Arc<ClusterState> {
        let mut nodes = Nodes::builder()
            .put(Node::new("local", "local", "10.0.0.1:9300"))
            .local_node_id("local");
        if with_peer {
            nodes = nodes.put(Node::new("peer", "peer", "10.0.0.2:9300"));
        }
        ClusterState::builder("test").nodes(nodes.build()).build()
    }

    #[tokio::test]
    async fn test_logs_every_nth_failure_and_resets() {
        let state = Arc::new(ArcSwap::new(state(true)));
        let transport = Arc::new(DownTransport::default());
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut rc = ReconnectToNodes::new(state, transport.clone(), bus, 3);

        for _ in 0..2 {
            rc.reconcile_once().await;
        }
        assert_eq!(rc.failure_count("peer"), Some(2));
        assert!(rx.try_recv().is_err());

        rc.reconcile_once().await;
        assert_eq!(rc.failure_count("peer"), Some(0));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::NodeReconnectFailed);
        assert_eq!(ev.node.as_deref(), Some("peer"));

        // the local node is never dialed
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_counters_of_departed_nodes_are_purged() {
        let state = Arc::new(ArcSwap::new(state(true)));
        let mut rc = ReconnectToNodes::new(
            state.clone(),
            Arc::new(DownTransport::default()),
            Bus::new(4),
            6,
        );

        rc.reconcile_once().await;
        assert_eq!(rc.failure_count("peer"), Some(1));

        state.store(self::state(false));
        rc.reconcile_once().await;
        assert_eq!(rc.failure_count("peer"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let state = Arc::new(ArcSwap::new(state(true)));
        let transport = Arc::new(DownTransport::default());
        let rc = ReconnectToNodes::new(state, transport.clone(), Bus::new(4), 6);
        let token = CancellationToken::new();
        let handle = tokio::spawn(rc.run(Duration::from_secs(10), token.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }
}
