//! HTTP and WebSocket handlers plus the shared `AppState`.

pub mod health;
pub mod websocket;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use websocket::ws_upgrade_handler;

use std::sync::Arc;
use std::time::Instant;

use super::{ConnectionRegistry, NetworkConfig, ShutdownController};
use crate::service::{DispatchPipeline, TrackingRegistry};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references and a cloneable pipeline, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Registry of all active WebSocket connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, TLS, per-connection settings).
    pub config: Arc<NetworkConfig>,
    /// Dispatch stack every inbound envelope goes through.
    pub pipeline: DispatchPipeline,
    /// Jobs that can still be stopped, reported by `/health`.
    pub tracking: Arc<TrackingRegistry>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
