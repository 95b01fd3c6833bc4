//! Shared application state

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::core::forwarder::Forwarder;
use crate::core::health::HealthTracker;
use crate::core::registry::ProviderRegistry;
use crate::core::selector::Selector;
use crate::core::session::SessionAffinity;
use crate::core::types::RoutingConfig;
use crate::utils::error::Result;

/// Everything the handlers share
///
/// Health and session state live here for the lifetime of the process
/// and are intentionally never persisted: a restart starts every
/// provider healthy with no affinity bindings.
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<HealthTracker>,
    pub sessions: Arc<SessionAffinity>,
    pub selector: Selector,
    pub forwarder: Forwarder,
}

impl AppState {
    /// Build the routing engine and seed the registry from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::new());
        for (cli, iface) in &config.interfaces {
            registry.replace(
                *cli,
                iface.providers.clone(),
                RoutingConfig { mode: iface.mode },
            )?;
        }

        let health = Arc::new(HealthTracker::new());
        let sessions = Arc::new(SessionAffinity::new(config.sessions.idle_window()));
        let selector = Selector::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            Arc::clone(&sessions),
        );
        let forwarder = Forwarder::new(Arc::clone(&health), config.timeouts.into())?;

        Ok(Self {
            registry,
            health,
            sessions,
            selector,
            forwarder,
        })
    }
}
