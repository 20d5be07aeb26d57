//! Startup and shutdown hooks for long-lived services.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::ServerConfig;

/// Handed to every service when it starts.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

/// A service the binary starts before serving and stops after the
/// listener has drained.
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Name used in lifecycle logs (e.g., `"packet_injector"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Stops the service. With `terminate` set, skip anything that could block.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}
