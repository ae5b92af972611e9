//! Decision model returned by policy engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use weir_core::GovernanceAction;

/// Kind of access a policy decision governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Write,
    Copy,
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Read => "read",
            OperationType::Write => "write",
            OperationType::Copy => "copy",
            OperationType::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// The operation a decision applies to. An empty destination means the
/// decision is not tied to a destination region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessOperation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,
}

impl AccessOperation {
    pub fn new(kind: OperationType, destination: impl Into<String>) -> Self {
        Self {
            kind,
            destination: destination.into(),
        }
    }

    /// Whether a decision recorded for `self` applies to `requested`.
    pub fn applies_to(&self, requested: &AccessOperation) -> bool {
        self.kind == requested.kind
            && (self.destination.is_empty() || self.destination == requested.destination)
    }
}

/// A policy an engine reports as having contributed to a decision. Carried
/// for auditing only; it never changes the actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedPolicy {
    pub description: String,
    /// Engine-specific policy identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl UsedPolicy {
    /// A policy known only by its description.
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            id: None,
            version: None,
        }
    }
}

/// Actions an engine requires for one operation, with the policies that
/// produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDecision {
    pub operation: AccessOperation,
    #[serde(default)]
    pub enforcement_actions: Vec<GovernanceAction>,
    #[serde(default)]
    pub used_policies: Vec<UsedPolicy>,
}

/// Decisions scoped to a single dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDecision {
    pub dataset_id: String,
    #[serde(default)]
    pub decisions: Vec<OperationDecision>,
}

/// Identity and version of the engine component that answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersion {
    /// Component name, e.g. the engine connector.
    pub name: String,
    pub id: String,
    pub version: String,
}

/// Everything one or more engines decided for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecisions {
    #[serde(default)]
    pub component_versions: Vec<ComponentVersion>,
    /// Decisions that apply to every dataset of the request.
    #[serde(default)]
    pub general_decisions: Vec<OperationDecision>,
    /// Decisions for individual datasets, possibly several per dataset
    /// before compaction.
    #[serde(default)]
    pub dataset_decisions: Vec<DatasetDecision>,
}

impl PolicyDecisions {
    pub fn is_empty(&self) -> bool {
        self.component_versions.is_empty()
            && self.general_decisions.is_empty()
            && self.dataset_decisions.is_empty()
    }

    /// Enforcement actions that apply to `operation` on `dataset_id`, general
    /// decisions first, in decision order.
    pub fn actions_for(
        &self,
        dataset_id: &str,
        operation: &AccessOperation,
    ) -> Vec<GovernanceAction> {
        let general = self
            .general_decisions
            .iter()
            .filter(|d| d.operation.applies_to(operation));
        let specific = self
            .dataset_decisions
            .iter()
            .filter(|d| d.dataset_id == dataset_id)
            .flat_map(|d| d.decisions.iter())
            .filter(|d| d.operation.applies_to(operation));

        general
            .chain(specific)
            .flat_map(|d| d.enforcement_actions.iter().cloned())
            .collect()
    }
}

/// Whether an action list blocks the operation outright.
pub fn contains_deny(actions: &[GovernanceAction]) -> bool {
    actions.iter().any(GovernanceAction::is_deny)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::taxonomy::redact_column;

    #[test]
    fn destinationless_decision_applies_everywhere() {
        let any = AccessOperation::new(OperationType::Copy, "");
        let shire = AccessOperation::new(OperationType::Copy, "theshire");
        assert!(any.applies_to(&shire));
        assert!(shire.applies_to(&shire));
        assert!(!shire.applies_to(&AccessOperation::new(OperationType::Copy, "neverland")));
        assert!(!any.applies_to(&AccessOperation::new(OperationType::Read, "")));
    }

    #[test]
    fn actions_are_collected_for_matching_dataset_and_operation() {
        let read = AccessOperation::new(OperationType::Read, "");
        let decisions = PolicyDecisions {
            general_decisions: vec![OperationDecision {
                operation: read.clone(),
                enforcement_actions: vec![GovernanceAction::new("audit")],
                used_policies: Vec::new(),
            }],
            dataset_decisions: vec![
                DatasetDecision {
                    dataset_id: "s3/allow-dataset".to_string(),
                    decisions: vec![OperationDecision {
                        operation: read.clone(),
                        enforcement_actions: vec![redact_column("SSN")],
                        used_policies: Vec::new(),
                    }],
                },
                DatasetDecision {
                    dataset_id: "s3/deny-dataset".to_string(),
                    decisions: vec![OperationDecision {
                        operation: read.clone(),
                        enforcement_actions: vec![GovernanceAction::deny()],
                        used_policies: Vec::new(),
                    }],
                },
            ],
            ..PolicyDecisions::default()
        };

        let actions = decisions.actions_for("s3/allow-dataset", &read);
        let names: Vec<&str> = actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["audit", "redact"]);
        assert!(!contains_deny(&actions));
        assert!(contains_deny(&decisions.actions_for("s3/deny-dataset", &read)));
    }
}
