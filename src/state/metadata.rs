//! # Versioned sub-objects of the cluster state.
//!
//! Only the parts needed to express version and identity invariants are
//! modelled; allocation logic lives outside this crate.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Assignment of one shard copy to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardRouting {
    pub shard: u32,
    pub primary: bool,
    /// `None` while unassigned.
    pub node_id: Option<Arc<str>>,
}

/// Versioned routing table: index name → shard copies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    version: u64,
    indices: BTreeMap<String, Vec<ShardRouting>>,
}

impl RoutingTable {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn index(&self, name: &str) -> Option<&[ShardRouting]> {
        self.indices.get(name).map(Vec::as_slice)
    }

    pub fn indices(&self) -> impl Iterator<Item = (&str, &[ShardRouting])> {
        self.indices.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns a copy with `version` replaced.
    pub fn with_version(&self, version: u64) -> Self {
        Self {
            version,
            indices: self.indices.clone(),
        }
    }

    /// Returns a copy with the shards of `index` replaced.
    pub fn with_index(&self, index: impl Into<String>, shards: Vec<ShardRouting>) -> Self {
        let mut indices = self.indices.clone();
        indices.insert(index.into(), shards);
        Self {
            version: self.version,
            indices,
        }
    }

    /// Returns a copy without `index`.
    pub fn without_index(&self, index: &str) -> Self {
        let mut indices = self.indices.clone();
        indices.remove(index);
        Self {
            version: self.version,
            indices,
        }
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "routing_table (version {}):", self.version)?;
        for (index, shards) in &self.indices {
            writeln!(f, "-- index [{index}]")?;
            for s in shards {
                let node = s.node_id.as_deref().unwrap_or("unassigned");
                let kind = if s.primary { "P" } else { "R" };
                writeln!(f, "----shard [{}][{kind}] {node}", s.shard)?;
            }
        }
        Ok(())
    }
}

/// Per-index metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMetaData {
    pub name: String,
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

/// Versioned cluster metadata: indices and persistent settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaData {
    version: u64,
    indices: BTreeMap<String, IndexMetaData>,
    settings: BTreeMap<String, String>,
}

impl MetaData {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn index(&self, name: &str) -> Option<&IndexMetaData> {
        self.indices.get(name)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexMetaData> {
        self.indices.values()
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn with_version(&self, version: u64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    pub fn with_index(&self, index: IndexMetaData) -> Self {
        let mut next = self.clone();
        next.indices.insert(index.name.clone(), index);
        next
    }

    pub fn without_index(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.indices.remove(name);
        next
    }

    pub fn with_setting(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.settings.insert(key.into(), value.into());
        next
    }
}

/// A global block restricting operations on the cluster.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterBlock {
    pub id: u32,
    pub description: Arc<str>,
}

impl ClusterBlock {
    pub fn new(id: u32, description: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }

    /// Block present until a master has been elected.
    pub fn no_master() -> Self {
        Self::new(2, "no master")
    }
}

/// Set of global cluster blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterBlocks {
    global: BTreeSet<ClusterBlock>,
}

impl ClusterBlocks {
    pub fn has_global_block(&self, block: &ClusterBlock) -> bool {
        self.global.contains(block)
    }

    pub fn global(&self) -> impl Iterator<Item = &ClusterBlock> {
        self.global.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    pub fn with_global_block(&self, block: ClusterBlock) -> Self {
        let mut global = self.global.clone();
        global.insert(block);
        Self { global }
    }

    pub fn without_global_block(&self, block: &ClusterBlock) -> Self {
        let mut global = self.global.clone();
        global.remove(block);
        Self { global }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table_copies_keep_version() {
        let rt = RoutingTable::default().with_version(4);
        let next = rt.with_index(
            "logs",
            vec![ShardRouting {
                shard: 0,
                primary: true,
                node_id: Some("a".into()),
            }],
        );
        assert_eq!(next.version(), 4);
        assert_eq!(next.index("logs").map(<[ShardRouting]>::len), Some(1));
        assert!(next.without_index("logs").index("logs").is_none());
    }

    #[test]
    fn test_blocks_add_remove() {
        let blocks = ClusterBlocks::default().with_global_block(ClusterBlock::no_master());
        assert!(blocks.has_global_block(&ClusterBlock::no_master()));
        assert!(blocks.without_global_block(&ClusterBlock::no_master()).is_empty());
    }
}
