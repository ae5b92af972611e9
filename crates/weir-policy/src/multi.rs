//! Combines a main engine with optional extension engines.

use crate::client::{PolicyClient, PolicyRequest};
use crate::decisions::PolicyDecisions;
use crate::error::PolicyError;
use crate::merge::merge_compact;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;

/// Queries every engine concurrently and merges their decisions. Any engine
/// failure fails the whole lookup.
pub struct MultiPolicyClient {
    engines: Vec<Arc<dyn PolicyClient>>,
}

impl MultiPolicyClient {
    pub fn new(main: Arc<dyn PolicyClient>) -> Self {
        Self {
            engines: vec![main],
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn PolicyClient>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn engines(&self) -> usize {
        self.engines.len()
    }
}

#[async_trait]
impl PolicyClient for MultiPolicyClient {
    fn name(&self) -> &str {
        "multi"
    }

    async fn get_decisions(&self, request: &PolicyRequest) -> Result<PolicyDecisions, PolicyError> {
        let results =
            try_join_all(self.engines.iter().map(|engine| engine.get_decisions(request))).await?;
        Ok(merge_compact(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::{AccessOperation, OperationType};
    use crate::mock::{MockPolicyClient, Rule};
    use weir_core::GovernanceAction;

    struct FailingClient;

    #[async_trait]
    impl PolicyClient for FailingClient {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_decisions(
            &self,
            _request: &PolicyRequest,
        ) -> Result<PolicyDecisions, PolicyError> {
            Err(PolicyError::unavailable("failing", "connection refused"))
        }
    }

    fn read(dataset: &str) -> PolicyRequest {
        PolicyRequest::new(dataset, AccessOperation::new(OperationType::Read, ""))
    }

    #[tokio::test]
    async fn decisions_of_all_engines_are_merged() {
        let extension = MockPolicyClient::new("extension").rule(Rule::dataset_actions(
            crate::mock::Matcher::Always,
            vec![GovernanceAction::new("encrypt").with_id("encrypt-ID")],
        ));
        let client = MultiPolicyClient::new(Arc::new(MockPolicyClient::fixtures()))
            .with_engine(Arc::new(extension));
        assert_eq!(client.engines(), 2);

        let actions = client
            .required_actions(&read("s3/default-dataset"))
            .await
            .expect("lookup succeeds");
        let ids: Vec<&str> = actions.iter().map(|a| a.identifier()).collect();
        assert_eq!(ids, vec!["redact-ID", "encrypt-ID"]);
    }

    #[tokio::test]
    async fn one_failing_engine_fails_the_lookup() {
        let client = MultiPolicyClient::new(Arc::new(MockPolicyClient::fixtures()))
            .with_engine(Arc::new(FailingClient));
        let err = client
            .get_decisions(&read("s3/allow-dataset"))
            .await
            .expect_err("lookup fails");
        assert!(matches!(err, PolicyError::Unavailable { .. }));
    }
}
