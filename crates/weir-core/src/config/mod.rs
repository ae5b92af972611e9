//! Configuration types for the Weir control plane.
//!
//! Configuration is loaded from a single YAML file (`weir.yaml`). Every
//! section and field is optional; missing values fall back to defaults.
//!
//! # Sections
//!
//! - **controller**: worker pool size, re-queue delays and finalizer name
//! - **connectors**: collaborator timeout and policy engines
//! - **storage**: regions holding storage accounts for implicit copies
//! - **observability**: log filter and output format
//! - **audit**: audit trail toggles

pub mod audit;
pub mod connectors;
pub mod controller;
pub mod observability;
pub mod storage;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use audit::AuditConfig;
pub use connectors::ConnectorsConfig;
pub use controller::ControllerConfig;
pub use observability::ObservabilityConfig;
pub use storage::StorageConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeirConfig {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub connectors: ConnectorsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl WeirConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.max_concurrent_reconciles == 0 {
            return Err(ConfigError::Invalid(
                "controller.max_concurrent_reconciles must be at least 1".to_string(),
            ));
        }
        if self.controller.finalizer.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "controller.finalizer must not be empty".to_string(),
            ));
        }
        if self.connectors.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connectors.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
