//! In-memory storage allocator backed by per-region storage accounts.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use weir_core::{Properties, PropertyValue};
use weir_planner::{OwnerRef, StorageAllocator, StorageError, StorageStatus, StoreRef};

struct Allocation {
    owner_uid: String,
    store: StoreRef,
}

#[derive(Default)]
struct Accounts {
    counter: u64,
    /// Store name -> allocation.
    allocations: BTreeMap<String, Allocation>,
}

pub struct MemoryStorageAllocator {
    regions: BTreeSet<String>,
    accounts: Mutex<Accounts>,
    provisioned: AtomicBool,
}

impl MemoryStorageAllocator {
    /// An allocator with a storage account in each of `regions`.
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            accounts: Mutex::new(Accounts::default()),
            provisioned: AtomicBool::new(true),
        }
    }

    /// Whether newly queried stores report as provisioned.
    pub fn set_provisioned(&self, provisioned: bool) {
        self.provisioned.store(provisioned, Ordering::SeqCst);
    }

    pub async fn get(&self, name: &str) -> Option<StoreRef> {
        self.accounts
            .lock()
            .await
            .allocations
            .get(name)
            .map(|a| a.store.clone())
    }

    pub async fn names(&self) -> Vec<String> {
        self.accounts.lock().await.allocations.keys().cloned().collect()
    }
}

#[async_trait]
impl StorageAllocator for MemoryStorageAllocator {
    async fn allocate(
        &self,
        region: &str,
        owner: &OwnerRef,
        asset_id: &str,
    ) -> Result<StoreRef, StorageError> {
        if !self.regions.contains(region) {
            return Err(StorageError::NoAccount(region.to_string()));
        }

        let mut accounts = self.accounts.lock().await;
        if let Some(existing) = accounts
            .allocations
            .values()
            .find(|a| a.owner_uid == owner.uid && a.store.asset_id == asset_id && a.store.region == region)
        {
            return Ok(existing.store.clone());
        }

        accounts.counter += 1;
        let name = format!("weir-{}-{}", owner.name, accounts.counter);
        let store = StoreRef {
            name: name.clone(),
            region: region.to_string(),
            asset_id: asset_id.to_string(),
            connection: Properties::from([
                ("bucket".to_string(), PropertyValue::from(name.clone())),
                (
                    "endpoint".to_string(),
                    PropertyValue::from(format!("https://storage.{region}.example")),
                ),
            ]),
            secret_ref: Some(format!("storage-{region}-credentials")),
            persistent: false,
        };
        accounts.allocations.insert(
            name,
            Allocation {
                owner_uid: owner.uid.clone(),
                store: store.clone(),
            },
        );
        tracing::debug!(store = %store.name, region = %region, asset = %asset_id, "storage allocated");
        Ok(store)
    }

    async fn set_persistent(&self, name: &str, persistent: bool) -> Result<(), StorageError> {
        let mut accounts = self.accounts.lock().await;
        let allocation = accounts
            .allocations
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        allocation.store.persistent = persistent;
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<StorageStatus, StorageError> {
        if !self.accounts.lock().await.allocations.contains_key(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(StorageStatus {
            provisioned: self.provisioned.load(Ordering::SeqCst),
            error: None,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.accounts
            .lock()
            .await
            .allocations
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn owned_by(&self, owner: &OwnerRef) -> Result<Vec<StoreRef>, StorageError> {
        Ok(self
            .accounts
            .lock()
            .await
            .allocations
            .values()
            .filter(|a| a.owner_uid == owner.uid)
            .map(|a| a.store.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerRef {
        OwnerRef {
            namespace: "default".to_string(),
            name: "notebook".to_string(),
            uid: "uid-1".to_string(),
        }
    }

    #[tokio::test]
    async fn allocation_is_idempotent_per_owner_and_asset() {
        let allocator = MemoryStorageAllocator::new(["theshire"]);
        let first = allocator
            .allocate("theshire", &owner(), "db2/allow-dataset")
            .await
            .expect("allocated");
        let again = allocator
            .allocate("theshire", &owner(), "db2/allow-dataset")
            .await
            .expect("allocated");
        assert_eq!(first, again);

        let other = allocator
            .allocate("theshire", &owner(), "kafka/allow-dataset")
            .await
            .expect("allocated");
        assert_ne!(first.name, other.name);
        assert_eq!(allocator.owned_by(&owner()).await.expect("listed").len(), 2);
    }

    #[tokio::test]
    async fn unknown_region_has_no_account() {
        let allocator = MemoryStorageAllocator::new(["theshire"]);
        let err = allocator
            .allocate("mordor", &owner(), "db2/allow-dataset")
            .await
            .expect_err("no account");
        assert!(matches!(err, StorageError::NoAccount(_)));
    }

    #[tokio::test]
    async fn status_follows_provisioning_flag() {
        let allocator = MemoryStorageAllocator::new(["theshire"]);
        let store = allocator
            .allocate("theshire", &owner(), "db2/allow-dataset")
            .await
            .expect("allocated");
        allocator.set_provisioned(false);
        assert!(!allocator.status(&store.name).await.expect("status").provisioned);
        allocator.delete(&store.name).await.expect("deleted");
        assert!(allocator.status(&store.name).await.is_err());
    }
}
