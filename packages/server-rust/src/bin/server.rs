//! pktinject-server -- WebSocket control service for packet injection.
//!
//! Every option can also be set through its `PKTINJECT_*` environment
//! variable. Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use pktinject_core::TopologyGraph;
use pktinject_server::network::{NetworkConfig, NetworkModule, TlsConfig};
use pktinject_server::service::{
    build_dispatch_pipeline, ManagedService, PacketInjectorServer, ServerConfig, ServiceContext,
    SpeakerPool,
};
use pktinject_server::{MemoryGraph, UdpInjector};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Packet injection control service.
#[derive(Parser, Debug)]
#[command(name = "pktinject-server", version, about)]
struct Cli {
    /// Bind address
    #[arg(long, env = "PKTINJECT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free port)
    #[arg(long, env = "PKTINJECT_PORT", default_value_t = 8082)]
    port: u16,

    /// Node identifier reported in logs
    #[arg(long, env = "PKTINJECT_NODE_ID", default_value = "pktinject")]
    node_id: String,

    /// JSON file holding the topology node array
    #[arg(long, env = "PKTINJECT_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// PEM certificate chain; enables TLS together with --tls-key
    #[arg(long, env = "PKTINJECT_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "PKTINJECT_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Inbound messages handled at once; further messages wait
    #[arg(
        long,
        env = "PKTINJECT_MAX_CONCURRENT_MESSAGES",
        default_value_t = 1000
    )]
    max_concurrent_messages: usize,

    /// Seconds a silent WebSocket connection stays open
    #[arg(long, env = "PKTINJECT_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    idle_timeout_secs: u64,

    /// Largest inbound WebSocket frame, in bytes
    #[arg(long, env = "PKTINJECT_MAX_FRAME_BYTES", default_value_t = 1 << 20)]
    max_frame_bytes: usize,

    /// Seconds shutdown waits for in-flight requests to be answered
    #[arg(long, env = "PKTINJECT_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Browser origin allowed by CORS; repeat or comma-separate ("*" allows any)
    #[arg(
        long = "allowed-origin",
        env = "PKTINJECT_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    allowed_origins: Vec<String>,

    /// Expose Prometheus metrics on this address
    #[arg(long, env = "PKTINJECT_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Log output format
    #[arg(
        long,
        env = "PKTINJECT_LOG_FORMAT",
        value_enum,
        default_value = "pretty"
    )]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn network_config(cli: &Cli) -> NetworkConfig {
    let mut config = NetworkConfig {
        host: cli.host.clone(),
        port: cli.port,
        allowed_origins: cli.allowed_origins.clone(),
        drain_timeout: Duration::from_secs(cli.drain_timeout_secs),
        ..NetworkConfig::default()
    };
    config.session.idle_timeout = Duration::from_secs(cli.idle_timeout_secs);
    config.session.max_frame_bytes = cli.max_frame_bytes;
    if let (Some(cert_path), Some(key_path)) = (&cli.tls_cert, &cli.tls_key) {
        config.tls = Some(TlsConfig {
            cert_path: cert_path.clone(),
            key_path: key_path.clone(),
        });
    }
    config
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exposed");
    }

    let graph: Arc<dyn TopologyGraph> = match &cli.topology {
        Some(path) => Arc::new(MemoryGraph::load(path)?),
        None => Arc::new(MemoryGraph::new()),
    };
    info!(nodes = graph.node_count(), "topology loaded");

    let server_config = Arc::new(ServerConfig {
        node_id: cli.node_id.clone(),
        max_concurrent_messages: cli.max_concurrent_messages,
    });

    let pool = SpeakerPool::new();
    let injector = PacketInjectorServer::new(graph, Arc::new(UdpInjector::new()), &pool)?;

    injector
        .init(&ServiceContext {
            config: Arc::clone(&server_config),
        })
        .await
        .with_context(|| format!("starting {}", injector.name()))?;

    let pipeline = build_dispatch_pipeline(pool, server_config.max_concurrent_messages);
    let mut network = NetworkModule::new(network_config(&cli), pipeline, injector.tracking());
    let port = network.start().await?;
    info!(port, node_id = %server_config.node_id, "pktinject-server listening");

    let served = network.serve(shutdown_signal()).await;
    injector.shutdown(false).await?;
    served
}
