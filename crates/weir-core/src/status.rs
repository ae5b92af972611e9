//! Observed state of an application, as written back by the reconciler.

use crate::error::ErrorReason;
use crate::module::EndpointSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition of a single asset. Exactly one holds at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AssetCondition {
    #[default]
    Pending,
    Ready,
    Deny {
        reason: ErrorReason,
        message: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<ErrorReason>,
        message: String,
    },
}

impl AssetCondition {
    pub fn deny(reason: ErrorReason) -> Self {
        let message = reason.to_string();
        AssetCondition::Deny { reason, message }
    }

    pub fn error(reason: Option<ErrorReason>, message: impl Into<String>) -> Self {
        AssetCondition::Error {
            reason,
            message: message.into(),
        }
    }

    /// Builds the condition matching a reason's classification.
    pub fn from_reason(reason: ErrorReason, detail: Option<&str>) -> Self {
        if reason.is_deny() {
            return AssetCondition::deny(reason);
        }
        let message = match detail {
            Some(detail) => format!("{reason} ({detail})"),
            None => reason.to_string(),
        };
        AssetCondition::error(Some(reason), message)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AssetCondition::Ready)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, AssetCondition::Deny { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AssetCondition::Error { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            AssetCondition::Deny { message, .. } | AssetCondition::Error { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&ErrorReason> {
        match self {
            AssetCondition::Deny { reason, .. } => Some(reason),
            AssetCondition::Error { reason, .. } => reason.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetState {
    pub condition: AssetCondition,
    /// Where the workload reads this asset from, once planned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointSpec>,
    /// Catalog id of the registered copy, when registration was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cataloged_asset: Option<String>,
}

/// Coarse lifecycle phase, derived at the end of every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Pending,
    Validating,
    Planning,
    Provisioning,
    Deployed,
    Ready,
    PartialError,
    Denied,
    Deleting,
}

/// Pointer to a generated resource, stamped with the generation it was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub app_version: u64,
}

/// Storage allocated on behalf of an application for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedStorage {
    /// Name of the allocated store.
    pub dataset_ref: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    /// Persistent stores outlive the application.
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_application: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_generation: Option<u64>,
    #[serde(default)]
    pub observed_generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Asset id -> state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_states: BTreeMap<String, AssetState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<ResourceReference>,
    /// Asset id -> storage.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provisioned_storage: BTreeMap<String, ProvisionedStorage>,
}

impl ApplicationStatus {
    pub fn condition(&self, asset_id: &str) -> Option<&AssetCondition> {
        self.asset_states.get(asset_id).map(|s| &s.condition)
    }

    pub fn set_condition(&mut self, asset_id: &str, condition: AssetCondition) {
        self.asset_states
            .entry(asset_id.to_string())
            .or_default()
            .condition = condition;
    }
}
