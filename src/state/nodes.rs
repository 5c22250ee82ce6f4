//! # Cluster membership: nodes, the elected master, and membership deltas.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A member of the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    id: Arc<str>,
    name: Arc<str>,
    address: Arc<str>,
    attributes: BTreeMap<String, String>,
    client: bool,
}

impl Node {
    /// Creates a data/master-eligible node.
    pub fn new(
        id: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        address: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            attributes: BTreeMap::new(),
            client: false,
        }
    }

    /// Marks the node as a client node (holds no data, never master).
    pub fn with_client(mut self, client: bool) -> Self {
        self.client = client;
        self
    }

    /// Attaches a node attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn is_client(&self) -> bool {
        self.client
    }

    /// Whether this node should hold a transport connection to `other`.
    ///
    /// Never to itself, and client nodes do not connect to each other.
    pub fn should_connect_to(&self, other: &Node) -> bool {
        if self.id == other.id {
            return false;
        }
        !(self.client && other.client)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{{{}}}{{{}}}", self.name, self.id, self.address)
    }
}

/// Immutable set of cluster members plus the local and elected master ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Nodes {
    nodes: BTreeMap<Arc<str>, Node>,
    local_node_id: Option<Arc<str>>,
    master_node_id: Option<Arc<str>>,
}

impl Nodes {
    pub fn builder() -> NodesBuilder {
        NodesBuilder::default()
    }

    /// Starts a builder pre-populated with this set.
    pub fn to_builder(&self) -> NodesBuilder {
        NodesBuilder {
            nodes: self.nodes.clone(),
            local_node_id: self.local_node_id.clone(),
            master_node_id: self.master_node_id.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_exists(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn local_node_id(&self) -> Option<&str> {
        self.local_node_id.as_deref()
    }

    pub fn master_node_id(&self) -> Option<&str> {
        self.master_node_id.as_deref()
    }

    pub fn local_node(&self) -> Option<&Node> {
        self.local_node_id.as_deref().and_then(|id| self.nodes.get(id))
    }

    pub fn master_node(&self) -> Option<&Node> {
        self.master_node_id.as_deref().and_then(|id| self.nodes.get(id))
    }

    /// True when the local node is the elected master.
    pub fn local_node_master(&self) -> bool {
        match (&self.local_node_id, &self.master_node_id) {
            (Some(local), Some(master)) => local == master,
            _ => false,
        }
    }

    /// Computes the membership change from `previous` to `self`.
    pub fn delta(&self, previous: &Nodes) -> NodesDelta {
        let removed = previous
            .iter()
            .filter(|n| !self.node_exists(n.id()))
            .cloned()
            .collect();
        let added = self
            .iter()
            .filter(|n| !previous.node_exists(n.id()))
            .cloned()
            .collect();
        NodesDelta {
            previous_master: previous.master_node().cloned(),
            new_master: self.master_node().cloned(),
            local_node_id: self.local_node_id.clone(),
            removed,
            added,
        }
    }
}

impl fmt::Display for Nodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: ")?;
        for node in self.iter() {
            write!(f, "   {node}")?;
            if self.local_node_id.as_deref() == Some(node.id()) {
                write!(f, ", local")?;
            }
            if self.master_node_id.as_deref() == Some(node.id()) {
                write!(f, ", master")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Builder for [`Nodes`].
#[derive(Default)]
pub struct NodesBuilder {
    nodes: BTreeMap<Arc<str>, Node>,
    local_node_id: Option<Arc<str>>,
    master_node_id: Option<Arc<str>>,
}

impl NodesBuilder {
    /// Adds or replaces a node.
    pub fn put(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn remove(mut self, id: &str) -> Self {
        self.nodes.remove(id);
        self
    }

    pub fn local_node_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.local_node_id = Some(id.into());
        self
    }

    pub fn master_node_id(mut self, id: Option<Arc<str>>) -> Self {
        self.master_node_id = id;
        self
    }

    pub fn build(self) -> Nodes {
        Nodes {
            nodes: self.nodes,
            local_node_id: self.local_node_id,
            master_node_id: self.master_node_id,
        }
    }
}

/// Membership change between two states.
#[derive(Clone, Debug)]
pub struct NodesDelta {
    previous_master: Option<Node>,
    new_master: Option<Node>,
    local_node_id: Option<Arc<str>>,
    removed: Vec<Node>,
    added: Vec<Node>,
}

impl NodesDelta {
    pub fn has_changes(&self) -> bool {
        self.master_node_changed() || !self.removed.is_empty() || !self.added.is_empty()
    }

    pub fn master_node_changed(&self) -> bool {
        self.previous_master.as_ref().map(Node::id) != self.new_master.as_ref().map(Node::id)
    }

    pub fn previous_master(&self) -> Option<&Node> {
        self.previous_master.as_ref()
    }

    pub fn new_master(&self) -> Option<&Node> {
        self.new_master.as_ref()
    }

    pub fn removed_nodes(&self) -> &[Node] {
        &self.removed
    }

    pub fn added_nodes(&self) -> &[Node] {
        &self.added
    }

    /// One-line human readable summary, empty when nothing changed.
    ///
    /// The local node is never reported as added.
    pub fn short_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.master_node_changed() {
            let mut s = String::new();
            if let Some(prev) = &self.previous_master {
                s.push_str(&format!("master {{removed [{prev}]}}"));
            }
            if let Some(new) = &self.new_master {
                if !s.is_empty() {
                    s.push_str(", ");
                }
                s.push_str(&format!("master {{new [{new}]}}"));
            }
            parts.push(s);
        }
        if !self.removed.is_empty() {
            let list: Vec<String> = self.removed.iter().map(|n| format!("[{n}]")).collect();
            parts.push(format!("removed {{{}}}", list.join(",")));
        }
        let added: Vec<String> = self
            .added
            .iter()
            .filter(|n| self.local_node_id.as_deref() != Some(n.id()))
            .map(|n| format!("[{n}]"))
            .collect();
        if !added.is_empty() {
            parts.push(format!("added {{{}}}", added.join(",")));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node::new(id, format!("name-{id}"), format!("127.0.0.1:{}", id.len()))
    }

    #[test]
    fn test_local_node_master() {
        let nodes = Nodes::builder()
            .put(node("a"))
            .put(node("b"))
            .local_node_id("a")
            .master_node_id(Some("a".into()))
            .build();
        assert!(nodes.local_node_master());

        let other = nodes.to_builder().master_node_id(Some("b".into())).build();
        assert!(!other.local_node_master());
        assert_eq!(other.master_node().map(Node::id), Some("b"));
    }

    #[test]
    fn test_delta_added_and_removed() {
        let prev = Nodes::builder().put(node("a")).put(node("b")).build();
        let next = Nodes::builder().put(node("a")).put(node("c")).build();

        let delta = next.delta(&prev);
        assert!(delta.has_changes());
        assert_eq!(delta.removed_nodes().len(), 1);
        assert_eq!(delta.removed_nodes()[0].id(), "b");
        assert_eq!(delta.added_nodes()[0].id(), "c");
        assert!(!delta.master_node_changed());
        assert!(delta.short_summary().contains("removed"));
        assert!(delta.short_summary().contains("added"));
    }

    #[test]
    fn test_delta_without_changes_has_empty_summary() {
        let prev = Nodes::builder().put(node("a")).build();
        let delta = prev.clone().delta(&prev);
        assert!(!delta.has_changes());
        assert!(delta.short_summary().is_empty());
    }

    #[test]
    fn test_should_connect_to() {
        let a = node("a");
        let client_a = node("ca").with_client(true);
        let client_b = node("cb").with_client(true);

        assert!(!a.should_connect_to(&a));
        assert!(a.should_connect_to(&client_a));
        assert!(client_a.should_connect_to(&a));
        assert!(!client_a.should_connect_to(&client_b));
    }
}
