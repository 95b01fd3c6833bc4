//! Test fixtures for routing-engine tests

use super::{CliType, Provider};

/// A minimal enabled provider for tests
pub(crate) fn provider(id: &str, position: u32) -> Provider {
    Provider {
        id: id.to_string(),
        cli_type: CliType::ClaudeCode,
        name: id.to_string(),
        base_url: "https://api.example.com".to_string(),
        credential: "sk-test".to_string(),
        enabled: true,
        position,
        weight: 1,
        failure_threshold: 3,
        blacklist_secs: 300,
        model_maps: Vec::new(),
    }
}

/// Same fixture with an explicit load-balancing weight
pub(crate) fn weighted_provider(id: &str, position: u32, weight: u32) -> Provider {
    Provider {
        weight,
        ..provider(id, position)
    }
}
