//! In-memory topology store.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use pktinject_core::{Node, TopologyGraph};

/// Node table keyed by node id, loadable from a JSON array of nodes.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: HashMap<String, Node>,
}

impl MemoryGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `nodes`; later duplicates replace earlier ones.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        Self { nodes }
    }

    /// Reads a JSON array of nodes from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a node array.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology file {}", path.display()))?;
        let nodes: Vec<Node> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing topology file {}", path.display()))?;
        Ok(Self::from_nodes(nodes))
    }
}

impl TopologyGraph for MemoryGraph {
    fn get_node(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_misses_unknown_ids() {
        let graph = MemoryGraph::from_nodes([Node::new("a")]);
        assert_eq!(graph.get_node("a").unwrap().id, "a");
        assert!(graph.get_node("b").is_none());
        assert_eq!(MemoryGraph::new().node_count(), 0);
    }

    #[test]
    fn from_nodes_keeps_last_duplicate() {
        let graph = MemoryGraph::from_nodes([
            Node::new("a").with_metadata("Name", json!("first")),
            Node::new("a").with_metadata("Name", json!("second")),
            Node::new("b"),
        ]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.get_node("a").unwrap().name(), Some("second"));
    }

    #[test]
    fn load_reads_node_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!([
                {"ID": "host-1", "Metadata": {"Name": "eth0", "IPV4": ["10.0.0.1/24"]}},
                {"ID": "host-2"}
            ])
        )
        .unwrap();

        let graph = MemoryGraph::load(file.path()).unwrap();
        assert_eq!(graph.node_count(), 2);
        let node = graph.get_node("host-1").unwrap();
        assert_eq!(node.first_address(false), Some("10.0.0.1".parse().unwrap()));
        assert!(graph.get_node("host-2").unwrap().metadata.is_empty());
    }

    #[test]
    fn load_reports_the_failing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"not\": \"an array\"}}").unwrap();

        let err = MemoryGraph::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing topology file"));

        let missing = MemoryGraph::load("/definitely/not/here.json").unwrap_err();
        assert!(missing.to_string().contains("reading topology file"));
    }
}
