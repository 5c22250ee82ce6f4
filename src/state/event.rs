//! # Change notification handed to cluster state listeners and the publisher.

use std::sync::Arc;

use super::cluster_state::ClusterState;
use super::nodes::NodesDelta;

/// Describes the transition from `previous_state` to `state`.
#[derive(Clone, Debug)]
pub struct ClusterChangedEvent {
    source: Arc<str>,
    state: Arc<ClusterState>,
    previous_state: Arc<ClusterState>,
    nodes_delta: NodesDelta,
}

impl ClusterChangedEvent {
    pub fn new(
        source: impl Into<Arc<str>>,
        state: Arc<ClusterState>,
        previous_state: Arc<ClusterState>,
    ) -> Self {
        let nodes_delta = state.nodes().delta(previous_state.nodes());
        Self {
            source: source.into(),
            state,
            previous_state,
            nodes_delta,
        }
    }

    /// Source label of the batch that produced this change.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> &Arc<ClusterState> {
        &self.state
    }

    pub fn previous_state(&self) -> &Arc<ClusterState> {
        &self.previous_state
    }

    pub fn nodes_delta(&self) -> &NodesDelta {
        &self.nodes_delta
    }

    pub fn nodes_changed(&self) -> bool {
        self.nodes_delta.has_changes()
    }

    pub fn nodes_added(&self) -> bool {
        !self.nodes_delta.added_nodes().is_empty()
    }

    pub fn nodes_removed(&self) -> bool {
        !self.nodes_delta.removed_nodes().is_empty()
    }

    pub fn routing_table_changed(&self) -> bool {
        !Arc::ptr_eq(
            self.state.routing_table(),
            self.previous_state.routing_table(),
        )
    }

    pub fn metadata_changed(&self) -> bool {
        !Arc::ptr_eq(self.state.metadata(), self.previous_state.metadata())
    }

    pub fn blocks_changed(&self) -> bool {
        !Arc::ptr_eq(self.state.blocks(), self.previous_state.blocks())
    }

    pub fn local_node_master(&self) -> bool {
        self.state.nodes().local_node_master()
    }

    /// True when the index exists in the new metadata but not in the previous one.
    pub fn index_created(&self, index: &str) -> bool {
        self.state.metadata().has_index(index) && !self.previous_state.metadata().has_index(index)
    }

    /// Names of indices present before and gone now.
    pub fn indices_deleted(&self) -> Vec<String> {
        self.previous_state
            .metadata()
            .indices()
            .filter(|i| !self.state.metadata().has_index(&i.name))
            .map(|i| i.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{IndexMetaData, MetaData};

    #[test]
    fn test_change_flags_follow_identity() {
        let prev = ClusterState::builder("test").build();
        let meta = MetaData::default().with_index(IndexMetaData {
            name: "logs".into(),
            number_of_shards: 1,
            number_of_replicas: 0,
        });
        let next = ClusterState::builder_from(&prev).metadata(meta).build();

        let ev = ClusterChangedEvent::new("create-index [logs]", next, prev);
        assert!(ev.metadata_changed());
        assert!(!ev.routing_table_changed());
        assert!(!ev.blocks_changed());
        assert!(ev.index_created("logs"));
        assert!(ev.indices_deleted().is_empty());
        assert_eq!(ev.source(), "create-index [logs]");
    }
}
