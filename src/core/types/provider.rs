//! Provider records and model rewrite rules

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CliType;

/// One outbound model rewrite rule
///
/// The first enabled entry whose `source_model` exactly matches the
/// requested model wins; a miss passes the requested model through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMap {
    pub source_model: String,
    pub target_model: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A configured upstream provider for one client interface
///
/// Records are owned by the administration layer; the router consumes
/// immutable snapshots of them. Health state (`consecutive_failures`,
/// blacklist) lives in the router's `HealthTracker`, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Stable identifier, unique within the interface
    pub id: String,
    /// The client interface this provider serves
    pub cli_type: CliType,
    /// Display name
    pub name: String,
    /// Upstream base URL, e.g. `https://api.anthropic.com`
    pub base_url: String,
    /// Upstream credential, injected into the outbound authorization
    pub credential: String,
    /// Administrative on/off switch
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Priority order within the interface; a dense permutation of `0..n`
    #[serde(default)]
    pub position: u32,
    /// Relative traffic share in load-balanced mode
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Consecutive transport failures before the provider is blacklisted
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long a blacklist lasts, in seconds
    #[serde(default = "default_blacklist_secs")]
    pub blacklist_secs: u64,
    /// Ordered model rewrite rules
    #[serde(default)]
    pub model_maps: Vec<ModelMap>,
}

impl Provider {
    /// Rewrite a requested model through this provider's map
    ///
    /// Scans `model_maps` in order and returns the target of the first
    /// enabled exact match, or the requested model unchanged.
    pub fn rewrite_model<'a>(&'a self, requested: &'a str) -> &'a str {
        self.model_maps
            .iter()
            .find(|m| m.enabled && m.source_model == requested)
            .map(|m| m.target_model.as_str())
            .unwrap_or(requested)
    }

    /// Blacklist duration as a `Duration`
    pub fn blacklist_duration(&self) -> Duration {
        Duration::from_secs(self.blacklist_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_blacklist_secs() -> u64 {
    300
}
