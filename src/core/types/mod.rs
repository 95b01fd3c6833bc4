//! Core data types shared across the routing engine

mod provider;

#[cfg(test)]
pub(crate) mod test_util;

pub use provider::{ModelMap, Provider};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::GatewayError;

/// The CLI protocol families the gateway fronts
///
/// A closed set: each inbound request targets exactly one of these, and
/// providers are configured per interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliType {
    ClaudeCode,
    Codex,
    Gemini,
}

impl CliType {
    /// All supported client interfaces
    pub const ALL: [CliType; 3] = [CliType::ClaudeCode, CliType::Codex, CliType::Gemini];

    /// Stable string form, matching the path segment and config key
    pub fn as_str(&self) -> &'static str {
        match self {
            CliType::ClaudeCode => "claude_code",
            CliType::Codex => "codex",
            CliType::Gemini => "gemini",
        }
    }
}

impl fmt::Display for CliType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CliType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude_code" => Ok(CliType::ClaudeCode),
            "codex" => Ok(CliType::Codex),
            "gemini" => Ok(CliType::Gemini),
            other => Err(GatewayError::Validation(format!(
                "unknown client interface: {}",
                other
            ))),
        }
    }
}

/// Routing mode for a client interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Strict priority-ordered failover across eligible providers
    #[default]
    AvailabilityFirst,
    /// Weighted distribution across eligible providers with session stickiness
    LoadBalanced,
}

/// Per-interface routing configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Routing mode applied to every request on this interface
    #[serde(default)]
    pub mode: RoutingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_type_round_trips_through_str() {
        for cli in CliType::ALL {
            assert_eq!(cli.as_str().parse::<CliType>().unwrap(), cli);
        }
    }

    #[test]
    fn unknown_cli_type_is_rejected() {
        assert!("cursor".parse::<CliType>().is_err());
    }

    #[test]
    fn routing_mode_defaults_to_availability_first() {
        assert_eq!(RoutingMode::default(), RoutingMode::AvailabilityFirst);
    }

    #[test]
    fn routing_mode_serializes_snake_case() {
        let json = serde_json::to_string(&RoutingMode::LoadBalanced).unwrap();
        assert_eq!(json, "\"load_balanced\"");
    }
}
