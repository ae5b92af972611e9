//! Asset metadata as reported by the catalog, and the per-asset requirements
//! derived from an application request.

use crate::taxonomy::{Interface, Properties};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where and how a dataset is physically stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStore {
    /// Connection name (e.g. "s3", "db2").
    pub name: String,
    #[serde(flatten)]
    pub interface: Interface,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub connection: Properties,
    /// Reference to the secret holding the credentials for this store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

/// Catalog view of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub store: DataStore,
    /// Region the data resides in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Column name -> tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_tags: BTreeMap<String, Vec<String>>,
}

impl AssetMetadata {
    /// Location and interface must be fully described for a data path to be planned.
    pub fn has_valid_store(&self) -> bool {
        self.store.interface.is_complete()
    }
}

/// Which data paths an asset participates in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub read: bool,
    pub write: bool,
    pub copy: bool,
}

/// Everything the planner needs to know about one requested asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRequest {
    pub asset_id: String,
    /// Interface the workload wants to consume the data through.
    pub interface: Interface,
    pub usage: Usage,
    /// Catalog into which an implicit or explicit copy must be registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_in_catalog: Option<String>,
    pub metadata: AssetMetadata,
}
