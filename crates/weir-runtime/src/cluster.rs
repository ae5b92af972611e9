use async_trait::async_trait;
use weir_core::Cluster;

#[async_trait]
pub trait ClusterLister: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Cluster>>;
}

/// A fixed set of clusters.
pub struct StaticClusterLister {
    clusters: Vec<Cluster>,
}

impl StaticClusterLister {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }
}

#[async_trait]
impl ClusterLister for StaticClusterLister {
    async fn list(&self) -> anyhow::Result<Vec<Cluster>> {
        Ok(self.clusters.clone())
    }
}
