//! Deployment restrictions produced by configuration evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use weir_core::FlowType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployDecision {
    /// Deploy only if the asset needs the flow.
    #[default]
    Unspecified,
    Required,
    Forbidden,
}

/// Restrictions on one flow of one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDecision {
    #[serde(default)]
    pub deploy: DeployDecision,
    /// Module names this flow may use. `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<BTreeSet<String>>,
    /// Cluster names this flow may run on. `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<BTreeSet<String>>,
}

impl FlowDecision {
    pub fn allows_module(&self, name: &str) -> bool {
        self.modules.as_ref().is_none_or(|m| m.contains(name))
    }

    pub fn is_forbidden(&self) -> bool {
        self.deploy == DeployDecision::Forbidden
    }
}

/// Per-flow restrictions for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDecisions {
    #[serde(default)]
    pub read: FlowDecision,
    #[serde(default)]
    pub write: FlowDecision,
    #[serde(default)]
    pub copy: FlowDecision,
}

impl ConfigDecisions {
    pub fn flow(&self, flow: FlowType) -> &FlowDecision {
        match flow {
            FlowType::Read => &self.read,
            FlowType::Write => &self.write,
            FlowType::Copy => &self.copy,
        }
    }
}
