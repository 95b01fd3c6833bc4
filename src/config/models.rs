//! Configuration data model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::forwarder::ForwardTimeouts;
use crate::core::types::{CliType, Provider, RoutingMode};

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
    pub sessions: SessionConfig,
    /// Startup provider seed per client interface
    pub interfaces: HashMap<CliType, InterfaceConfig>,
}

/// HTTP server bind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7788,
        }
    }
}

/// Timeout classes, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub stream_first_byte_secs: u64,
    pub stream_idle_secs: u64,
    pub non_stream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            stream_first_byte_secs: 30,
            stream_idle_secs: 60,
            non_stream_secs: 120,
        }
    }
}

impl From<TimeoutConfig> for ForwardTimeouts {
    fn from(config: TimeoutConfig) -> Self {
        Self {
            first_byte: Duration::from_secs(config.stream_first_byte_secs),
            idle: Duration::from_secs(config.stream_idle_secs),
            non_stream: Duration::from_secs(config.non_stream_secs),
        }
    }
}

/// Session affinity configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle window after which a session binding is evicted, in seconds
    pub idle_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { idle_secs: 3600 }
    }
}

impl SessionConfig {
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Startup configuration for one client interface
///
/// The provider list order defines priority: positions are reassigned
/// densely from it when the registry is seeded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub mode: RoutingMode,
    pub providers: Vec<Provider>,
}
