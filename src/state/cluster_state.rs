//! # Immutable, versioned cluster state snapshot.
//!
//! A [`ClusterState`] is always handled as `Arc<ClusterState>`. Its sub-objects
//! are `Arc`s as well so that "did the routing table change?" is answered by
//! identity (`Arc::ptr_eq`), never by deep comparison.
//!
//! ## Rules
//! - Only the elected master changes `version`; each accepted change is `+1`.
//! - Routing table / metadata versions move only when their identity changed.
//! - [`ClusterStateStatus`] is the only interior-mutable field and is written
//!   by the update worker alone.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use uuid::Uuid;

use super::metadata::{ClusterBlocks, MetaData, RoutingTable};
use super::nodes::Nodes;

/// Apply progress of a state inside the update worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStateStatus {
    Unknown,
    BeingApplied,
    Applied,
}

impl ClusterStateStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ClusterStateStatus::BeingApplied,
            2 => ClusterStateStatus::Applied,
            _ => ClusterStateStatus::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ClusterStateStatus::Unknown => 0,
            ClusterStateStatus::BeingApplied => 1,
            ClusterStateStatus::Applied => 2,
        }
    }
}

/// Immutable snapshot of the cluster.
pub struct ClusterState {
    version: u64,
    state_uuid: Uuid,
    cluster_name: Arc<str>,
    nodes: Arc<Nodes>,
    routing_table: Arc<RoutingTable>,
    metadata: Arc<MetaData>,
    blocks: Arc<ClusterBlocks>,
    status: AtomicU8,
}

impl ClusterState {
    /// Starts an empty state for `cluster_name` (version 0).
    pub fn builder(cluster_name: impl Into<Arc<str>>) -> ClusterStateBuilder {
        ClusterStateBuilder {
            version: 0,
            state_uuid: None,
            cluster_name: cluster_name.into(),
            nodes: Arc::new(Nodes::default()),
            routing_table: Arc::new(RoutingTable::default()),
            metadata: Arc::new(MetaData::default()),
            blocks: Arc::new(ClusterBlocks::default()),
        }
    }

    /// Starts a builder that copies `state`, keeping its version and uuid.
    pub fn builder_from(state: &ClusterState) -> ClusterStateBuilder {
        ClusterStateBuilder {
            version: state.version,
            state_uuid: Some(state.state_uuid),
            cluster_name: state.cluster_name.clone(),
            nodes: state.nodes.clone(),
            routing_table: state.routing_table.clone(),
            metadata: state.metadata.clone(),
            blocks: state.blocks.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state_uuid(&self) -> Uuid {
        self.state_uuid
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn nodes(&self) -> &Arc<Nodes> {
        &self.nodes
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.routing_table
    }

    pub fn metadata(&self) -> &Arc<MetaData> {
        &self.metadata
    }

    pub fn blocks(&self) -> &Arc<ClusterBlocks> {
        &self.blocks
    }

    pub fn status(&self) -> ClusterStateStatus {
        ClusterStateStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: ClusterStateStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }
}

impl fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterState")
            .field("version", &self.version)
            .field("state_uuid", &self.state_uuid)
            .field("cluster_name", &self.cluster_name)
            .field("nodes", &self.nodes.len())
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "state uuid: {}", self.state_uuid)?;
        writeln!(f, "from_diff: false")?;
        write!(f, "meta data version: {}", self.metadata.version())?;
        writeln!(f)?;
        write!(f, "{}", self.nodes)?;
        write!(f, "{}", self.routing_table)
    }
}

/// Builder for [`ClusterState`].
pub struct ClusterStateBuilder {
    version: u64,
    state_uuid: Option<Uuid>,
    cluster_name: Arc<str>,
    nodes: Arc<Nodes>,
    routing_table: Arc<RoutingTable>,
    metadata: Arc<MetaData>,
    blocks: Arc<ClusterBlocks>,
}

impl ClusterStateBuilder {
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Bumps the version by one; the built state gets a fresh uuid.
    pub fn increment_version(mut self) -> Self {
        self.version += 1;
        self.state_uuid = None;
        self
    }

    pub fn nodes(mut self, nodes: impl Into<Arc<Nodes>>) -> Self {
        self.nodes = nodes.into();
        self
    }

    pub fn routing_table(mut self, routing_table: impl Into<Arc<RoutingTable>>) -> Self {
        self.routing_table = routing_table.into();
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Arc<MetaData>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn blocks(mut self, blocks: impl Into<Arc<ClusterBlocks>>) -> Self {
        self.blocks = blocks.into();
        self
    }

    pub fn build(self) -> Arc<ClusterState> {
        Arc::new(ClusterState {
            version: self.version,
            state_uuid: self.state_uuid.unwrap_or_else(Uuid::new_v4),
            cluster_name: self.cluster_name,
            nodes: self.nodes,
            routing_table: self.routing_table,
            metadata: self.metadata,
            blocks: self.blocks,
            status: AtomicU8::new(ClusterStateStatus::Unknown.as_u8()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_from_keeps_identity_of_sub_objects() {
        let base = ClusterState::builder("test").version(7).build();
        let copy = ClusterState::builder_from(&base).build();

        assert_eq!(copy.version(), 7);
        assert_eq!(copy.state_uuid(), base.state_uuid());
        assert!(Arc::ptr_eq(copy.routing_table(), base.routing_table()));
        assert!(Arc::ptr_eq(copy.metadata(), base.metadata()));
        assert!(!Arc::ptr_eq(&copy, &base));
    }

    #[test]
    fn test_increment_version_generates_new_uuid() {
        let base = ClusterState::builder("test").version(1).build();
        let next = ClusterState::builder_from(&base).increment_version().build();

        assert_eq!(next.version(), 2);
        assert_ne!(next.state_uuid(), base.state_uuid());
    }

    #[test]
    fn test_status_transitions() {
        let state = ClusterState::builder("test").build();
        assert_eq!(state.status(), ClusterStateStatus::Unknown);
        state.set_status(ClusterStateStatus::BeingApplied);
        assert_eq!(state.status(), ClusterStateStatus::BeingApplied);
        state.set_status(ClusterStateStatus::Applied);
        assert_eq!(state.status(), ClusterStateStatus::Applied);
    }
}
