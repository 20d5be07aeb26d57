//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until shutdown. Binding before serving
//! lets callers learn the real port (e.g., when configured with port 0)
//! before any traffic arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::connection::{ConnectionRegistry, OutboundMessage};
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, ws_upgrade_handler, AppState,
};
use super::middleware::apply_http_layers;
use super::shutdown::ShutdownController;
use crate::service::{DispatchPipeline, TrackingRegistry};

/// Manages the full HTTP/WebSocket server lifecycle.
///
/// 1. `new()` -- allocates shared state (registry, shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownController>,
    pipeline: DispatchPipeline,
    tracking: Arc<TrackingRegistry>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    ///
    /// Every inbound envelope on `/ws` is dispatched through `pipeline`;
    /// `/health` reports the size of `tracking`.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        pipeline: DispatchPipeline,
        tracking: Arc<TrackingRegistry>,
    ) -> Self {
        Self {
            config,
            listener: None,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownController::new()),
            pipeline,
            tracking,
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness check
    /// - `GET /health/ready` -- readiness check
    /// - `GET /ws` -- WebSocket upgrade
    pub fn build_router(&self) -> Router {
        build_router(self.app_state(), &self.config)
    }

    fn app_state(&self) -> AppState {
        AppState {
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            pipeline: self.pipeline.clone(),
            tracking: Arc::clone(&self.tracking),
            start_time: Instant::now(),
        }
    }

    /// Binds the TCP listener and returns the actual bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// When it does:
    /// 1. Health state moves to Draining and read loops stop taking frames
    /// 2. The HTTP server stops accepting connections
    /// 3. In-flight messages get up to `drain_timeout` to finish replying
    /// 4. Remaining connections receive a Close frame
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, if TLS material
    /// cannot be loaded, or on a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let state = self.app_state();
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = build_router(state, &self.config);
        let registry = self.registry;
        let shutdown_ctrl = self.shutdown;

        let trigger = Arc::clone(&shutdown_ctrl);
        let shutdown = async move {
            shutdown.await;
            trigger.trigger_shutdown();
        };

        shutdown_ctrl.set_ready();

        if let Some(ref tls_config) = self.config.tls {
            serve_tls(listener, router, tls_config, shutdown).await?;
        } else {
            info!("Serving plain HTTP/WS connections");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
        }

        drain_connections(&registry, &shutdown_ctrl, &self.config).await;
        Ok(())
    }
}

fn build_router(state: AppState, config: &NetworkConfig) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/ws", get(ws_upgrade_handler));

    apply_http_layers(routes, config).with_state(state)
}

/// Serves TLS connections using `axum-server` with rustls, reusing the
/// pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls_config.cert_path, &tls_config.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

/// Waits for in-flight messages, then closes every remaining connection.
async fn drain_connections(
    registry: &ConnectionRegistry,
    shutdown_ctrl: &ShutdownController,
    config: &NetworkConfig,
) {
    shutdown_ctrl.trigger_shutdown();

    if shutdown_ctrl.wait_for_drain(config.drain_timeout).await {
        info!("All in-flight messages drained");
    } else {
        warn!(
            in_flight = shutdown_ctrl.in_flight_count(),
            "Drain timeout expired with in-flight messages remaining"
        );
    }

    let handles = registry.drain_all();
    if !handles.is_empty() {
        info!("Closing {} connections", handles.len());
        for handle in &handles {
            let _ = handle.try_send(OutboundMessage::Close(Some(
                "server shutting down".to_string(),
            )));
        }
    }
}
