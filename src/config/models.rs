use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
    /// Upper bound for HTTP request bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fjall_path: default_fjall_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024 // 2 MB
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingConfig {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// In-flight handler invocations per subscription
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,
    /// Buffered deliveries per subscriber
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            prefetch: default_prefetch(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_exchange() -> String {
    "General".to_string()
}

fn default_prefetch() -> usize {
    1
}

fn default_channel_capacity() -> usize {
    64
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
