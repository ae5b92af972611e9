//! Policy engine client boundary.

use crate::decisions::{AccessOperation, PolicyDecisions};
use crate::error::PolicyError;
use crate::merge::compact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weir_core::{GovernanceAction, Properties};

/// Input for a decision lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    pub dataset_id: String,
    pub operation: AccessOperation,
    /// Workload properties (application info).
    #[serde(default)]
    pub context: Properties,
    /// Reference to the credentials used when the engine consults the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

impl PolicyRequest {
    pub fn new(dataset_id: impl Into<String>, operation: AccessOperation) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            operation,
            context: Properties::new(),
            credentials: None,
        }
    }

    pub fn with_context(mut self, context: Properties) -> Self {
        self.context = context;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<String>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A policy engine answering which actions an operation on a dataset requires.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// Engine name, used in logs and errors.
    fn name(&self) -> &str;

    async fn get_decisions(&self, request: &PolicyRequest) -> Result<PolicyDecisions, PolicyError>;

    /// Compacted enforcement actions for the requested dataset and operation.
    /// The list may contain the reserved "Deny" action.
    async fn required_actions(
        &self,
        request: &PolicyRequest,
    ) -> Result<Vec<GovernanceAction>, PolicyError> {
        let decisions = compact(self.get_decisions(request).await?);
        let actions = decisions.actions_for(&request.dataset_id, &request.operation);
        tracing::debug!(
            engine = %self.name(),
            dataset = %request.dataset_id,
            operation = %request.operation.kind,
            destination = %request.operation.destination,
            actions = actions.len(),
            "policy decisions resolved"
        );
        Ok(actions)
    }
}

/// Allows everything without enforcing any action.
pub struct AllowAllPolicyClient;

#[async_trait]
impl PolicyClient for AllowAllPolicyClient {
    fn name(&self) -> &str {
        "allow-all"
    }

    async fn get_decisions(&self, _request: &PolicyRequest) -> Result<PolicyDecisions, PolicyError> {
        Ok(PolicyDecisions::default())
    }
}
