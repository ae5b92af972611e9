//! Settings for the catalog and policy collaborators.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    /// Bound on every call to an external collaborator.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the main policy engine.
    #[serde(default = "default_policy_engine")]
    pub policy_engine: String,

    /// Optional extension engine whose decisions are merged with the main one.
    #[serde(default)]
    pub extension_policy_engine: Option<String>,
}

impl ConnectorsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConnectorsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            policy_engine: default_policy_engine(),
            extension_policy_engine: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_policy_engine() -> String {
    "mock".to_string()
}
