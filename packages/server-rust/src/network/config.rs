//! Listener and WebSocket session settings.

use std::path::PathBuf;
use std::time::Duration;

/// Where and how the control service listens.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick a port; `NetworkModule::start` reports the real one.
    pub port: u16,
    /// Serve `wss://` instead of `ws://` when set.
    pub tls: Option<TlsConfig>,
    pub session: SessionConfig,
    /// Browser origins allowed by CORS. `"*"` allows any.
    pub allowed_origins: Vec<String>,
    /// Deadline for plain HTTP routes such as the health checks.
    pub http_timeout: Duration,
    /// How long shutdown waits for in-flight messages to be answered.
    pub drain_timeout: Duration,
}

impl NetworkConfig {
    /// `host:port` as passed to the TCP listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            tls: None,
            session: SessionConfig::default(),
            allowed_origins: vec!["*".to_string()],
            http_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// PEM files for the TLS listener.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Limits applied to every WebSocket session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Replies that may queue for the socket writer before senders wait.
    pub reply_queue: usize,
    /// How long a reply may wait for room in that queue.
    pub reply_timeout: Duration,
    /// A session that sends nothing for this long is closed.
    pub idle_timeout: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_queue: 256,
            reply_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_frame_bytes: 1 << 20,
        }
    }
}
