//! Storage accounts available for implicit copies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Regions holding a storage account, in preference order.
    #[serde(default)]
    pub regions: Vec<String>,
}

impl StorageConfig {
    /// Region new copies are allocated in.
    pub fn preferred_region(&self) -> Option<&str> {
        self.regions.first().map(String::as_str)
    }
}
