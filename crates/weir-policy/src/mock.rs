//! Rule-driven policy engine for tests and local runs.
//!
//! Rules are evaluated in order; the first rule whose matcher accepts the
//! request decides. Requests matching no rule get no decisions.

use crate::client::{PolicyClient, PolicyRequest};
use crate::decisions::{
    DatasetDecision, OperationDecision, OperationType, PolicyDecisions, UsedPolicy,
};
use crate::error::PolicyError;
use async_trait::async_trait;
use regex::Regex;
use weir_core::GovernanceAction;
use weir_core::taxonomy::redact_column;

/// Predicate over a policy request.
#[derive(Debug, Clone)]
pub enum Matcher {
    Always,
    /// Full dataset id matches the pattern.
    DatasetId(Regex),
    /// Part of a `catalog/asset` id after the first '/' equals the name.
    AssetName(String),
    /// A string workload property matches the pattern.
    Property { key: String, pattern: Regex },
    Operation(OperationType),
    Destination(String),
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn dataset_id(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::DatasetId(Regex::new(pattern)?))
    }

    pub fn property(key: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::Property {
            key: key.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn asset_name(name: impl Into<String>) -> Self {
        Matcher::AssetName(name.into())
    }

    pub fn matches(&self, request: &PolicyRequest) -> bool {
        match self {
            Matcher::Always => true,
            Matcher::DatasetId(re) => re.is_match(&request.dataset_id),
            Matcher::AssetName(name) => asset_name(&request.dataset_id) == name,
            Matcher::Property { key, pattern } => request
                .context
                .get(key)
                .and_then(|v| v.as_str())
                .is_some_and(|v| pattern.is_match(v)),
            Matcher::Operation(kind) => request.operation.kind == *kind,
            Matcher::Destination(dest) => request.operation.destination == *dest,
            Matcher::All(all) => all.iter().all(|m| m.matches(request)),
            Matcher::Any(any) => any.iter().any(|m| m.matches(request)),
            Matcher::Not(inner) => !inner.matches(request),
        }
    }
}

fn asset_name(dataset_id: &str) -> &str {
    dataset_id
        .split_once('/')
        .map(|(_, name)| name)
        .unwrap_or(dataset_id)
}

/// Where a rule's actions are recorded.
/// Where a matching rule records its actions.
#[derive(Debug, Clone)]
pub enum Handler {
    General(Vec<GovernanceAction>),
    Dataset(Vec<GovernanceAction>),
}

#[derive(Debug, Clone)]
pub struct Rule {
    matcher: Matcher,
    handler: Handler,
    description: String,
}

impl Rule {
    pub fn new(matcher: Matcher, handler: Handler, description: impl Into<String>) -> Self {
        Self {
            matcher,
            handler,
            description: description.into(),
        }
    }

    pub fn general_actions(matcher: Matcher, actions: Vec<GovernanceAction>) -> Self {
        Self::new(matcher, Handler::General(actions), "general rule")
    }

    pub fn dataset_actions(matcher: Matcher, actions: Vec<GovernanceAction>) -> Self {
        Self::new(matcher, Handler::Dataset(actions), "dataset rule")
    }

    fn decide(&self, request: &PolicyRequest) -> PolicyDecisions {
        let decision = |actions: &[GovernanceAction]| OperationDecision {
            operation: request.operation.clone(),
            enforcement_actions: actions.to_vec(),
            used_policies: vec![UsedPolicy::described(&self.description)],
        };
        match &self.handler {
            Handler::General(actions) => PolicyDecisions {
                general_decisions: vec![decision(actions)],
                ..PolicyDecisions::default()
            },
            Handler::Dataset(actions) => PolicyDecisions {
                dataset_decisions: vec![DatasetDecision {
                    dataset_id: request.dataset_id.clone(),
                    decisions: vec![decision(actions)],
                }],
                ..PolicyDecisions::default()
            },
        }
    }
}

/// In-memory engine answering from an ordered rule list. The first matching
/// rule decides; with no match the decisions are empty.
pub struct MockPolicyClient {
    name: String,
    rules: Vec<Rule>,
}

impl MockPolicyClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Decisions keyed on the asset part of `catalog/asset` ids:
    ///
    /// - `allow-dataset`: no actions
    /// - `deny-dataset`: Deny
    /// - `deny-on-copy`: Deny for copy only
    /// - `allow-theshire` / `allow-neverland`: Deny unless the destination is that region
    /// - `deny-theshire` / `deny-neverland`: Deny when the destination is that region
    /// - anything else: redact column `SSN`
    pub fn fixtures() -> Self {
        let mut client = Self::new("mock")
            .rule(Rule::new(
                Matcher::asset_name("allow-dataset"),
                Handler::Dataset(Vec::new()),
                "allow dataset",
            ))
            .rule(Rule::new(
                Matcher::asset_name("deny-dataset"),
                Handler::Dataset(vec![GovernanceAction::deny()]),
                "deny dataset",
            ))
            .rule(Rule::new(
                Matcher::All(vec![
                    Matcher::asset_name("deny-on-copy"),
                    Matcher::Operation(OperationType::Copy),
                ]),
                Handler::Dataset(vec![GovernanceAction::deny()]),
                "deny copy",
            ))
            .rule(Rule::new(
                Matcher::asset_name("deny-on-copy"),
                Handler::Dataset(Vec::new()),
                "allow except copy",
            ));

        for region in ["theshire", "neverland"] {
            client = client
                .rule(Rule::new(
                    Matcher::All(vec![
                        Matcher::asset_name(format!("allow-{region}")),
                        Matcher::Not(Box::new(Matcher::Destination(region.to_string()))),
                    ]),
                    Handler::Dataset(vec![GovernanceAction::deny()]),
                    format!("data may only go to {region}"),
                ))
                .rule(Rule::new(
                    Matcher::asset_name(format!("allow-{region}")),
                    Handler::Dataset(Vec::new()),
                    format!("data may go to {region}"),
                ))
                .rule(Rule::new(
                    Matcher::All(vec![
                        Matcher::asset_name(format!("deny-{region}")),
                        Matcher::Destination(region.to_string()),
                    ]),
                    Handler::Dataset(vec![GovernanceAction::deny()]),
                    format!("data may not go to {region}"),
                ))
                .rule(Rule::new(
                    Matcher::asset_name(format!("deny-{region}")),
                    Handler::Dataset(Vec::new()),
                    format!("data may go anywhere but {region}"),
                ));
        }

        client.rule(Rule::new(
            Matcher::Always,
            Handler::Dataset(vec![redact_column("SSN")]),
            "redact PII columns",
        ))
    }
}

#[async_trait]
impl PolicyClient for MockPolicyClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_decisions(&self, request: &PolicyRequest) -> Result<PolicyDecisions, PolicyError> {
        let decisions = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.decide(request))
            .unwrap_or_default();
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::{AccessOperation, contains_deny};
    use weir_core::PropertyValue;

    fn request(dataset: &str, kind: OperationType, dest: &str) -> PolicyRequest {
        PolicyRequest::new(dataset, AccessOperation::new(kind, dest))
    }

    async fn actions(client: &MockPolicyClient, req: PolicyRequest) -> Vec<GovernanceAction> {
        client.required_actions(&req).await.expect("mock never fails")
    }

    #[tokio::test]
    async fn fixture_decisions_follow_asset_names() {
        let mock = MockPolicyClient::fixtures();

        assert!(actions(&mock, request("s3/allow-dataset", OperationType::Read, "")).await.is_empty());
        assert!(contains_deny(
            &actions(&mock, request("s3/deny-dataset", OperationType::Read, "")).await
        ));

        let default = actions(&mock, request("db2/default-dataset", OperationType::Read, "")).await;
        assert_eq!(default, vec![redact_column("SSN")]);
    }

    #[tokio::test]
    async fn deny_on_copy_only_blocks_copies() {
        let mock = MockPolicyClient::fixtures();
        assert!(actions(&mock, request("db2/deny-on-copy", OperationType::Read, "")).await.is_empty());
        assert!(contains_deny(
            &actions(&mock, request("db2/deny-on-copy", OperationType::Copy, "theshire")).await
        ));
    }

    #[tokio::test]
    async fn residency_fixtures_depend_on_destination() {
        let mock = MockPolicyClient::fixtures();
        assert!(actions(&mock, request("s3/allow-theshire", OperationType::Read, "theshire")).await.is_empty());
        assert!(contains_deny(
            &actions(&mock, request("s3/allow-theshire", OperationType::Read, "neverland")).await
        ));
        assert!(contains_deny(
            &actions(&mock, request("s3/deny-theshire", OperationType::Copy, "theshire")).await
        ));
        assert!(actions(&mock, request("s3/deny-theshire", OperationType::Copy, "neverland")).await.is_empty());
    }

    #[tokio::test]
    async fn property_and_general_rules() {
        let mock = MockPolicyClient::new("props").rule(Rule::general_actions(
            Matcher::All(vec![
                Matcher::property("intent", "^fraud").expect("valid regex"),
                Matcher::Any(vec![
                    Matcher::dataset_id("^s3/").expect("valid regex"),
                    Matcher::dataset_id("^kafka/").expect("valid regex"),
                ]),
            ]),
            vec![GovernanceAction::new("audit")],
        ));

        let mut req = request("kafka/allow-dataset", OperationType::Read, "");
        assert!(actions(&mock, req.clone()).await.is_empty());

        req.context
            .insert("intent".to_string(), PropertyValue::from("fraud detection"));
        let decisions = mock.get_decisions(&req).await.expect("mock never fails");
        assert_eq!(decisions.general_decisions.len(), 1);
        assert_eq!(actions(&mock, req).await, vec![GovernanceAction::new("audit")]);
    }
}
