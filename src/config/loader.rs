//! Configuration loading

use std::path::Path;
use tracing::{debug, info};

use super::models::GatewayConfig;
use crate::utils::error::{GatewayError, Result};

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: GatewayConfig = serde_yaml::from_str(&raw)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load from a file when it exists, otherwise start with defaults
    ///
    /// A missing file is the normal first-run case: the administration
    /// layer can still configure providers over `/admin/v1`.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}
