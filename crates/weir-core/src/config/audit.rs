//! Audit trail configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are recorded.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether denied assets are recorded.
    #[serde(default = "default_enabled")]
    pub log_denials: bool,

    /// Whether storage allocation and release are recorded.
    #[serde(default = "default_enabled")]
    pub log_storage: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            log_denials: default_enabled(),
            log_storage: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}
