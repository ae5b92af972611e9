//! Planning, assignment and storage errors.

use weir_core::{ErrorClass, ErrorReason, FlowType};

/// Failure of a storage allocator call. Always retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// No account to allocate from in the requested region.
    #[error("no storage account is configured in region '{0}'")]
    NoAccount(String),

    /// Status or release of storage the allocator does not know.
    #[error("storage '{0}' not found")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Why a single asset could not be planned.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanningError {
    /// Policy refused an operation the asset needs.
    #[error("{0}")]
    Denied(ErrorReason),

    /// The asset's store interface lacks a protocol or format.
    #[error("InvalidAssetDataStore: store '{store}' has incomplete interface '{interface}'")]
    InvalidDataStore { store: String, interface: String },

    /// No registered module can serve `flow` for the asset.
    #[error("ModuleNotFound: {flow} ({detail})")]
    ModuleNotFound { flow: FlowType, detail: String },

    #[error("no storage region is configured for copying '{0}'")]
    NoStorageRegion(String),

    #[error("storage allocation failed: {0}")]
    Storage(#[from] StorageError),
}

impl PlanningError {
    pub fn module_not_found(flow: FlowType, detail: impl Into<String>) -> Self {
        PlanningError::ModuleNotFound {
            flow,
            detail: detail.into(),
        }
    }

    /// Condition reason reported on the asset, if the error has one.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            PlanningError::Denied(reason) => Some(reason.clone()),
            PlanningError::InvalidDataStore { .. } => Some(ErrorReason::InvalidAssetDataStore),
            PlanningError::ModuleNotFound { flow, .. } => Some(ErrorReason::ModuleNotFound(*flow)),
            PlanningError::NoStorageRegion(_) | PlanningError::Storage(_) => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PlanningError::Denied(_) | PlanningError::InvalidDataStore { .. } => ErrorClass::Deny,
            PlanningError::ModuleNotFound { .. } | PlanningError::NoStorageRegion(_) => {
                ErrorClass::Planning
            }
            PlanningError::Storage(_) => ErrorClass::Transient,
        }
    }

    /// Detail text without the reason prefix.
    pub fn detail(&self) -> Option<String> {
        match self {
            PlanningError::ModuleNotFound { detail, .. } => Some(detail.clone()),
            PlanningError::InvalidDataStore { store, interface } => {
                Some(format!("store '{store}' has incomplete interface '{interface}'"))
            }
            _ => None,
        }
    }
}

/// Failure to place steps on clusters. Reported on every asset of the
/// application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("InvalidClusterConfiguration: {0}")]
    InvalidClusterConfiguration(String),
}

impl AssignError {
    pub fn reason(&self) -> ErrorReason {
        ErrorReason::InvalidClusterConfiguration
    }
}
