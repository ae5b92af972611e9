//! Convergence loop settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Upper bound on passes running in parallel for different applications.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// Delay before re-checking an application that is not ready yet.
    #[serde(default = "default_requeue_secs")]
    pub requeue_secs: u64,

    /// Delay before re-checking storage that is still being provisioned.
    #[serde(default = "default_storage_requeue_secs")]
    pub storage_requeue_secs: u64,

    /// Delay before retrying a pass that failed with a transient error.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Finalizer protecting applications until their resources are released.
    #[serde(default = "default_finalizer")]
    pub finalizer: String,

    /// Cluster assumed to host workloads that do not name one.
    #[serde(default)]
    pub local_cluster: Option<String>,
}

impl ControllerConfig {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn storage_requeue_after(&self) -> Duration {
        Duration::from_secs(self.storage_requeue_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            requeue_secs: default_requeue_secs(),
            storage_requeue_secs: default_storage_requeue_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            finalizer: default_finalizer(),
            local_cluster: None,
        }
    }
}

fn default_max_concurrent_reconciles() -> usize {
    5
}

fn default_requeue_secs() -> u64 {
    10
}

fn default_storage_requeue_secs() -> u64 {
    2
}

fn default_error_backoff_secs() -> u64 {
    5
}

fn default_finalizer() -> String {
    "weir.io/application-finalizer".to_string()
}
