//! Gateway configuration
//!
//! Loaded from a YAML file with environment/CLI overrides layered on top.
//! Provider lists live here only as the startup seed; at runtime the
//! administration layer replaces them through the registry.

mod loader;
mod models;

pub use models::{
    GatewayConfig, InterfaceConfig, ServerConfig, SessionConfig, TimeoutConfig,
};
