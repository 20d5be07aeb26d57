//! Read-only view of the topology graph referenced by injection requests.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key listing a node's IPv4 addresses (`"a.b.c.d/len"` strings).
pub const IPV4_KEY: &str = "IPV4";

/// Metadata key listing a node's IPv6 addresses.
pub const IPV6_KEY: &str = "IPV6";

/// A topology node: an identifier plus free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Metadata", default)]
    pub metadata: Map<String, Value>,
}

impl Node {
    /// Creates a node with no metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Map::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The node's `Name` metadata, if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("Name").and_then(Value::as_str)
    }

    /// Addresses of the requested family, in metadata order.
    ///
    /// Accepts either a single string or an array of strings, each optionally
    /// suffixed with a prefix length. Entries that do not parse are skipped.
    #[must_use]
    pub fn addresses(&self, ipv6: bool) -> Vec<IpAddr> {
        let key = if ipv6 { IPV6_KEY } else { IPV4_KEY };
        let entries: Vec<&str> = match self.metadata.get(key) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(|entry| {
                let addr = entry.split_once('/').map_or(entry, |(addr, _)| addr);
                addr.parse::<IpAddr>().ok()
            })
            .filter(|ip| ip.is_ipv6() == ipv6)
            .collect()
    }

    /// First address of the requested family.
    #[must_use]
    pub fn first_address(&self, ipv6: bool) -> Option<IpAddr> {
        self.addresses(ipv6).into_iter().next()
    }
}

/// Read-only access to the topology store.
pub trait TopologyGraph: Send + Sync {
    /// Looks up a node by identifier.
    fn get_node(&self, id: &str) -> Option<Node>;

    /// Number of nodes currently known.
    fn node_count(&self) -> usize;
}
