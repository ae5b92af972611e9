//! Plan convergence: deploys the units of a stored plan and reports their state.

use crate::controller::{Action, Reconcile};
use crate::deployer::Deployer;
use crate::error::ReconcileError;
use crate::plans::PlanResource;
use crate::store::{Store, Versioned};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use weir_core::{PlanStatus, ResourceKey, WeirConfig};

pub struct PlanReconciler {
    plans: Arc<dyn Store<PlanResource>>,
    deployer: Arc<dyn Deployer>,
    requeue_after: Duration,
    timeout: Duration,
}

impl PlanReconciler {
    pub fn new(
        plans: Arc<dyn Store<PlanResource>>,
        deployer: Arc<dyn Deployer>,
        config: &WeirConfig,
    ) -> Self {
        Self {
            plans,
            deployer,
            requeue_after: config.controller.requeue_after(),
            timeout: config.connectors.timeout(),
        }
    }

    async fn converge(
        &self,
        key: &ResourceKey,
        current: Versioned<PlanResource>,
    ) -> Result<Action, ReconcileError> {
        let Versioned { version, value } = current;
        let units = tokio::time::timeout(self.timeout, self.deployer.apply(key, &value.spec.units))
            .await
            .map_err(|_| ReconcileError::Timeout {
                operation: "deploy plan",
                after: self.timeout,
            })??;

        let error = units
            .iter()
            .find_map(|(cluster, status)| status.error.as_ref().map(|e| format!("{cluster}: {e}")));
        let ready = error.is_none() && !units.is_empty() && units.values().all(|u| u.ready);
        let status = PlanStatus {
            observed_generation: value.metadata.generation,
            ready,
            error,
            units,
        };

        let settled = status.ready || status.error.is_some();
        if status != value.status {
            tracing::info!(ready = status.ready, units = status.units.len(), "plan status changed");
            let mut updated = value;
            updated.status = status;
            self.plans.update(version, updated).await?;
        }

        if settled {
            Ok(Action::Done)
        } else {
            Ok(Action::RequeueAfter(self.requeue_after))
        }
    }
}

#[async_trait]
impl Reconcile for PlanReconciler {
    async fn reconcile(&self, key: &ResourceKey) -> Result<Action, ReconcileError> {
        let Some(current) = self.plans.get(key).await? else {
            tracing::debug!(plan = %key, "plan gone, removing deployment");
            self.deployer.remove(key).await?;
            return Ok(Action::Done);
        };
        let span = tracing::info_span!("deploy", plan = %key, generation = current.value.metadata.generation);
        self.converge(key, current).instrument(span).await
    }
}
