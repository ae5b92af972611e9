//! Allocation of destination storage for implicit copies.

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weir_core::{Properties, ProvisionedStorage};

/// The application on whose behalf storage is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

/// An allocated store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRef {
    pub name: String,
    pub region: String,
    /// Asset the store was allocated for.
    pub asset_id: String,
    #[serde(default)]
    pub connection: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl StoreRef {
    pub fn to_provisioned(&self) -> ProvisionedStorage {
        ProvisionedStorage {
            dataset_ref: self.name.clone(),
            region: self.region.clone(),
            secret_ref: self.secret_ref.clone(),
            persistent: self.persistent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    /// The store exists and can be written to.
    pub provisioned: bool,
    /// Last provisioning failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Allocates and tracks the storage implicit copies write into.
#[async_trait]
pub trait StorageAllocator: Send + Sync {
    /// Allocates a store in `region` for `asset_id`. Idempotent per
    /// (owner, asset): a second call returns the existing store.
    async fn allocate(
        &self,
        region: &str,
        owner: &OwnerRef,
        asset_id: &str,
    ) -> Result<StoreRef, StorageError>;

    async fn set_persistent(&self, name: &str, persistent: bool) -> Result<(), StorageError>;

    async fn status(&self, name: &str) -> Result<StorageStatus, StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Every store currently allocated on behalf of `owner`.
    async fn owned_by(&self, owner: &OwnerRef) -> Result<Vec<StoreRef>, StorageError>;
}
