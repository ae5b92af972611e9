//! Reason vocabulary surfaced in asset conditions and application status.

use crate::module::FlowType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a failure is handled by the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Policy refused the access. Terminal for the current generation.
    Deny,
    /// The request itself is malformed. Terminal until the request changes.
    InvalidInput,
    /// No data path can be built with the registered modules. Retried.
    Planning,
    /// A collaborator failed or timed out. Retried with backoff.
    Transient,
    /// The cluster topology cannot host the plan. Retried.
    Cluster,
}

/// Machine-readable reason attached to a Deny or Error condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    ReadAccessDenied,
    WriteNotAllowed,
    CopyNotAllowed,
    #[serde(rename = "InvalidAssetID")]
    InvalidAssetId,
    InvalidAssetDataStore,
    ModuleNotFound(FlowType),
    InvalidClusterConfiguration,
}

impl ErrorReason {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorReason::ReadAccessDenied
            | ErrorReason::WriteNotAllowed
            | ErrorReason::CopyNotAllowed
            | ErrorReason::InvalidAssetId
            | ErrorReason::InvalidAssetDataStore => ErrorClass::Deny,
            ErrorReason::ModuleNotFound(_) => ErrorClass::Planning,
            ErrorReason::InvalidClusterConfiguration => ErrorClass::Cluster,
        }
    }

    /// Deny for policy refusals and unusable assets; Error otherwise.
    pub fn is_deny(&self) -> bool {
        self.class() == ErrorClass::Deny
    }

    /// The reason to report when the given flow is refused by policy.
    pub fn denied(flow: FlowType) -> Self {
        match flow {
            FlowType::Read => ErrorReason::ReadAccessDenied,
            FlowType::Write => ErrorReason::WriteNotAllowed,
            FlowType::Copy => ErrorReason::CopyNotAllowed,
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::ReadAccessDenied => f.write_str("ReadAccessDenied"),
            ErrorReason::WriteNotAllowed => f.write_str("WriteNotAllowed"),
            ErrorReason::CopyNotAllowed => f.write_str("CopyNotAllowed"),
            ErrorReason::InvalidAssetId => f.write_str("InvalidAssetID"),
            ErrorReason::InvalidAssetDataStore => f.write_str("InvalidAssetDataStore"),
            ErrorReason::ModuleNotFound(flow) => write!(f, "ModuleNotFound: {flow}"),
            ErrorReason::InvalidClusterConfiguration => f.write_str("InvalidClusterConfiguration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_fixed_vocabulary() {
        assert_eq!(ErrorReason::InvalidAssetId.to_string(), "InvalidAssetID");
        assert_eq!(
            ErrorReason::ModuleNotFound(FlowType::Copy).to_string(),
            "ModuleNotFound: copy"
        );
        assert_eq!(ErrorReason::denied(FlowType::Write), ErrorReason::WriteNotAllowed);
    }

    #[test]
    fn deny_reasons_are_classified() {
        assert!(ErrorReason::ReadAccessDenied.is_deny());
        assert!(ErrorReason::InvalidAssetDataStore.is_deny());
        assert!(!ErrorReason::ModuleNotFound(FlowType::Read).is_deny());
        assert_eq!(
            ErrorReason::InvalidClusterConfiguration.class(),
            ErrorClass::Cluster
        );
    }
}
