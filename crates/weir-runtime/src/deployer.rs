//! Deployment of execution units onto clusters.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use weir_core::{ExecutionUnit, ResourceKey, UnitStatus};

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Brings the deployment of `plan` in line with `units` (cluster name ->
    /// unit), removing units on clusters no longer listed, and reports the
    /// state of each unit.
    async fn apply(
        &self,
        plan: &ResourceKey,
        units: &BTreeMap<String, ExecutionUnit>,
    ) -> anyhow::Result<BTreeMap<String, UnitStatus>>;

    /// Removes every unit deployed for `plan`.
    async fn remove(&self, plan: &ResourceKey) -> anyhow::Result<()>;
}

/// Records deployed units in memory.
pub struct MemoryDeployer {
    deployed: RwLock<BTreeMap<ResourceKey, BTreeMap<String, ExecutionUnit>>>,
    ready: AtomicBool,
}

impl MemoryDeployer {
    pub fn new() -> Self {
        Self {
            deployed: RwLock::new(BTreeMap::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Whether applied units report ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Cluster name -> unit, for one plan.
    pub async fn deployed(&self, plan: &ResourceKey) -> BTreeMap<String, ExecutionUnit> {
        self.deployed
            .read()
            .await
            .get(plan)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MemoryDeployer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deployer for MemoryDeployer {
    async fn apply(
        &self,
        plan: &ResourceKey,
        units: &BTreeMap<String, ExecutionUnit>,
    ) -> anyhow::Result<BTreeMap<String, UnitStatus>> {
        self.deployed.write().await.insert(plan.clone(), units.clone());
        let ready = self.ready.load(Ordering::SeqCst);
        Ok(units
            .keys()
            .map(|cluster| (cluster.clone(), UnitStatus { ready, error: None }))
            .collect())
    }

    async fn remove(&self, plan: &ResourceKey) -> anyhow::Result<()> {
        self.deployed.write().await.remove(plan);
        Ok(())
    }
}
