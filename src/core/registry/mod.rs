//! Provider registry: immutable per-interface snapshots
//!
//! The administration layer owns provider records; the router consumes a
//! read-mostly cached view. Each client interface has a point-in-time
//! snapshot published through an atomic pointer swap, so concurrent
//! readers never block and never observe a torn list.

use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::core::types::{CliType, Provider, RoutingConfig};
use crate::utils::error::{GatewayError, Result};

/// Point-in-time view of one client interface's configuration
#[derive(Debug, Clone, Default)]
pub struct InterfaceSnapshot {
    /// Providers sorted by ascending `position`
    pub providers: Arc<Vec<Provider>>,
    /// Routing mode for the interface
    pub config: RoutingConfig,
}

/// In-memory registry of configured providers per client interface
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    inner: ArcSwap<HashMap<CliType, InterfaceSnapshot>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for a client interface
    ///
    /// Cheap: clones two `Arc`s, never locks. Interfaces with no
    /// configuration yield an empty snapshot.
    pub fn snapshot(&self, cli: CliType) -> InterfaceSnapshot {
        self.inner.load().get(&cli).cloned().unwrap_or_default()
    }

    /// Routing configuration for a client interface
    pub fn routing_config(&self, cli: CliType) -> RoutingConfig {
        self.snapshot(cli).config
    }

    /// Look up a provider by id across all interfaces
    pub fn find_provider(&self, id: &str) -> Option<Provider> {
        let map = self.inner.load();
        map.values()
            .flat_map(|snap| snap.providers.iter())
            .find(|p| p.id == id)
            .cloned()
    }

    /// Atomically replace one interface's provider list and routing config
    ///
    /// Invoked when the administration layer changes configuration.
    /// Positions are reassigned densely from the list order, so a reorder
    /// is a full-list replace. Rejects duplicate ids, empty base URLs,
    /// zero weights/thresholds and duplicate enabled rewrite sources.
    pub fn replace(
        &self,
        cli: CliType,
        mut providers: Vec<Provider>,
        config: RoutingConfig,
    ) -> Result<()> {
        for (idx, provider) in providers.iter_mut().enumerate() {
            provider.cli_type = cli;
            provider.position = idx as u32;
        }
        validate_providers(cli, &providers)?;

        let count = providers.len();
        let snapshot = InterfaceSnapshot {
            providers: Arc::new(providers),
            config,
        };

        self.inner.rcu(|map| {
            let mut next = HashMap::clone(map);
            next.insert(cli, snapshot.clone());
            next
        });

        info!(
            interface = %cli,
            providers = count,
            mode = ?config.mode,
            "replaced provider snapshot"
        );
        Ok(())
    }
}

/// Validate an interface's provider list before publishing it
fn validate_providers(cli: CliType, providers: &[Provider]) -> Result<()> {
    let mut ids = HashSet::new();
    for provider in providers {
        if provider.id.is_empty() {
            return Err(GatewayError::Validation(format!(
                "{}: provider with empty id",
                cli
            )));
        }
        if !ids.insert(provider.id.as_str()) {
            return Err(GatewayError::Validation(format!(
                "{}: duplicate provider id {}",
                cli, provider.id
            )));
        }
        Url::parse(&provider.base_url).map_err(|e| {
            GatewayError::Validation(format!(
                "{}: provider {} has invalid base_url: {}",
                cli, provider.id, e
            ))
        })?;
        if provider.weight == 0 {
            return Err(GatewayError::Validation(format!(
                "{}: provider {} has zero weight",
                cli, provider.id
            )));
        }
        if provider.failure_threshold == 0 {
            return Err(GatewayError::Validation(format!(
                "{}: provider {} has zero failure_threshold",
                cli, provider.id
            )));
        }
        let mut sources = HashSet::new();
        for map in provider.model_maps.iter().filter(|m| m.enabled) {
            if !sources.insert(map.source_model.as_str()) {
                return Err(GatewayError::Validation(format!(
                    "{}: provider {} has duplicate enabled rewrite source {}",
                    cli, provider.id, map.source_model
                )));
            }
        }
    }
    Ok(())
}
