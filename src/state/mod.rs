//! # Cluster state model.
//!
//! The immutable snapshot the pipeline serializes mutations of, plus the pieces
//! needed to reason about its identity and versions.
//!
//! ## Contents
//! - [`ClusterState`] / [`ClusterStateBuilder`] versioned snapshot (always behind `Arc`)
//! - [`Nodes`] / [`Node`] / [`NodesDelta`] membership, local and master ids
//! - [`RoutingTable`], [`MetaData`], [`ClusterBlocks`] versioned sub-objects
//! - [`ClusterChangedEvent`] previous/new pair handed to listeners and the publisher

mod cluster_state;
mod event;
mod metadata;
mod nodes;

pub use cluster_state::{ClusterState, ClusterStateBuilder, ClusterStateStatus};
pub use event::ClusterChangedEvent;
pub use metadata::{ClusterBlock, ClusterBlocks, IndexMetaData, MetaData, RoutingTable, ShardRouting};
pub use nodes::{Node, Nodes, NodesBuilder, NodesDelta};
