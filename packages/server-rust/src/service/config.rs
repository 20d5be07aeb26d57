/// Server-level configuration shared with every managed service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier for this server node, reported in logs.
    pub node_id: String,
    /// Maximum number of inbound messages handled concurrently. Further
    /// messages wait for a slot.
    pub max_concurrent_messages: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: "pktinject".to_string(),
            max_concurrent_messages: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.node_id, "pktinject");
        assert_eq!(config.max_concurrent_messages, 1000);
    }
}
