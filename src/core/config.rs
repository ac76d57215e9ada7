//! Registry configuration, read from `registry.toml` in the store root.

use crate::core::error::RegistryError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// `init` without a caller identity is rejected.
    pub require_admin: bool,
    /// Records fetched per store round trip during full-table scans.
    pub scan_page_size: usize,
    pub busy_timeout_secs: u64,
    /// Append one broker event per call to the audit log.
    pub audit_log: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            require_admin: true,
            scan_page_size: 64,
            busy_timeout_secs: 5,
            audit_log: true,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.scan_page_size == 0 {
            return Err(RegistryError::Config(
                "scan_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `registry.toml` from the store root. No file means defaults.
pub fn load_config(store_root: &Path) -> Result<RegistryConfig, RegistryError> {
    let config_path = store_root.join(schemas::CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(RegistryConfig::default());
    }

    let content = fs::read_to_string(&config_path)?;
    let config: RegistryConfig = toml::from_str(&content).map_err(|e| {
        RegistryError::Config(format!("{}: {}", config_path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}
