//! Message routing and execution framework.
//!
//! Inbound envelopes flow through:
//!
//! 1. **Middleware** (`middleware`): Tower layers (metrics, concurrency limit)
//! 2. **Speaker pool** (`pool`): Dispatch to the handler owning the `Namespace`
//! 3. **Handlers** (`injector`): The packet injector control service
//!
//! Long-lived services start and stop through [`ManagedService`].

pub mod config;
pub mod inbound;
pub mod injector;
pub mod lifecycle;
pub mod middleware;
pub mod pool;

// Re-export key types for convenient access.
pub use config::ServerConfig;
pub use inbound::{DispatchError, InboundMessage};
pub use injector::{PacketInjectorServer, TrackingRegistry};
pub use lifecycle::{ManagedService, ServiceContext};
pub use middleware::{build_dispatch_pipeline, DispatchPipeline};
pub use pool::SpeakerPool;
