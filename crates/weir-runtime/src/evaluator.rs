//! Infrastructure configuration decisions.
//!
//! An evaluator restricts, per flow, whether a step may be deployed at all,
//! which modules may serve it and which clusters may host it.

use async_trait::async_trait;
use weir_core::{AssetRequest, Cluster, Properties};
use weir_planner::{ConfigDecisions, RequiredActions};

pub struct EvaluationInput<'a> {
    pub app_info: &'a Properties,
    pub workload: Option<&'a Cluster>,
    pub request: &'a AssetRequest,
    pub actions: &'a RequiredActions,
}

#[async_trait]
pub trait ConfigEvaluator: Send + Sync {
    async fn evaluate(&self, input: &EvaluationInput<'_>) -> anyhow::Result<ConfigDecisions>;
}

/// Leaves every decision unspecified.
pub struct DefaultConfigEvaluator;

#[async_trait]
impl ConfigEvaluator for DefaultConfigEvaluator {
    async fn evaluate(&self, _input: &EvaluationInput<'_>) -> anyhow::Result<ConfigDecisions> {
        Ok(ConfigDecisions::default())
    }
}

/// Returns the same decisions for every asset.
pub struct StaticConfigEvaluator {
    decisions: ConfigDecisions,
}

impl StaticConfigEvaluator {
    pub fn new(decisions: ConfigDecisions) -> Self {
        Self { decisions }
    }
}

#[async_trait]
impl ConfigEvaluator for StaticConfigEvaluator {
    async fn evaluate(&self, input: &EvaluationInput<'_>) -> anyhow::Result<ConfigDecisions> {
        tracing::trace!(asset = %input.request.asset_id, "static config decisions");
        Ok(self.decisions.clone())
    }
}
